mod article;
mod link;
mod signal;

pub use article::{Article, NewArticle};
pub use link::{MentionEvidence, Ticker, TickerLink};
pub use signal::{Actual, EvaluatedPair, Horizon, MarketSession, Prediction, Strategy};
