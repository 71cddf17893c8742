mod aggregator;
mod keyword;
mod session;

pub use aggregator::{Aggregator, StrategySlots};
pub use keyword::KeywordStrategy;
pub use session::classify_session;

use crate::error::Result;
use crate::models::TickerLink;

/// Everything a scoring strategy may look at for one link.
pub struct ScoringInput<'a> {
    pub headline: &'a str,
    pub body: &'a str,
    pub link: &'a TickerLink,
}

/// Contract for one sentiment scoring function. Implementations return a
/// value normalized to [-1, 1], `None` when there is nothing to score, or
/// an error when the underlying model failed; a failure never affects
/// sibling strategies.
pub trait SentimentStrategy: Send + Sync {
    fn score(&self, input: &ScoringInput<'_>) -> Result<Option<f64>>;
}

impl<F> SentimentStrategy for F
where
    F: Fn(&ScoringInput<'_>) -> Result<Option<f64>> + Send + Sync,
{
    fn score(&self, input: &ScoringInput<'_>) -> Result<Option<f64>> {
        self(input)
    }
}
