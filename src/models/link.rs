use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::signal::{MarketSession, Strategy};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
    pub id: i64,
    pub symbol: String,
}

/// Raw per-ticker evidence extracted from one article. Re-extraction is
/// deterministic, so linking replaces these values instead of accumulating.
#[derive(Debug, Clone, Default)]
pub struct MentionEvidence {
    pub mentions: i64,
    pub pos_kw: i64,
    pub neg_kw: i64,
    pub tokens: Vec<String>,
}

/// The (article, ticker) association carrying all sentiment state for the
/// pair. Partially-scored links (some sentiment fields null) are a normal,
/// observable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerLink {
    pub id: i64,
    pub article_id: i64,
    pub ticker_id: i64,
    pub mentions: i64,
    pub pos_kw: i64,
    pub neg_kw: i64,
    pub tokens: Vec<String>,
    pub sentiment_dynamic: Option<f64>,
    pub sentiment_ml: Option<f64>,
    pub sentiment_keyword: Option<f64>,
    pub sentiment_combined: Option<f64>,
    pub headline_sentiment: Option<f64>,
    pub market_session: Option<MarketSession>,
    pub news_age_minutes: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl TickerLink {
    pub fn strategy_score(&self, strategy: Strategy) -> Option<f64> {
        match strategy {
            Strategy::Dynamic => self.sentiment_dynamic,
            Strategy::Ml => self.sentiment_ml,
            Strategy::Keyword => self.sentiment_keyword,
        }
    }

    /// True once at least one body strategy has produced a value.
    pub fn has_any_signal(&self) -> bool {
        Strategy::ALL
            .iter()
            .any(|s| self.strategy_score(*s).is_some())
    }
}
