mod engine;
mod model;

pub use engine::PredictionEngine;
pub use model::{BaselineModel, Forecast, ForecastInput, ForecastModel};
