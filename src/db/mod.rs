mod repository;
mod schema;

pub use repository::Repository;
pub use schema::SCHEMA;
