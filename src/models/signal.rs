use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// The three independent body-sentiment scoring strategies. Each one writes
/// its own nullable column, so a failed or missing strategy never blocks the
/// others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    Dynamic,
    Ml,
    Keyword,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Dynamic, Strategy::Ml, Strategy::Keyword];

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Dynamic => "dynamic",
            Strategy::Ml => "ml",
            Strategy::Keyword => "keyword",
        }
    }

    /// Column on `article_tickers` this strategy writes.
    pub fn column(self) -> &'static str {
        match self {
            Strategy::Dynamic => "sentiment_dynamic",
            Strategy::Ml => "sentiment_ml",
            Strategy::Keyword => "sentiment_keyword",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trading-calendar phase at scoring time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketSession {
    PreMarket,
    Regular,
    AfterHours,
    Closed,
}

impl MarketSession {
    pub fn as_str(self) -> &'static str {
        match self {
            MarketSession::PreMarket => "pre-market",
            MarketSession::Regular => "regular",
            MarketSession::AfterHours => "after-hours",
            MarketSession::Closed => "closed",
        }
    }
}

impl fmt::Display for MarketSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketSession {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre-market" => Ok(MarketSession::PreMarket),
            "regular" => Ok(MarketSession::Regular),
            "after-hours" => Ok(MarketSession::AfterHours),
            "closed" => Ok(MarketSession::Closed),
            other => Err(AppError::Validation(format!(
                "unknown market session '{other}'"
            ))),
        }
    }
}

/// Forecast window. A tagged enum rather than a free-form string so a typo
/// cannot slip past the (link, horizon, instant) uniqueness key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Horizon {
    OneHour,
    FourHours,
    EndOfDay,
}

impl Horizon {
    pub const ALL: [Horizon; 3] = [Horizon::OneHour, Horizon::FourHours, Horizon::EndOfDay];

    pub fn as_str(self) -> &'static str {
        match self {
            Horizon::OneHour => "1hr",
            Horizon::FourHours => "4hr",
            Horizon::EndOfDay => "eod",
        }
    }

    /// Nominal window length in minutes; end-of-session has no fixed length
    /// and reports the remainder of a full regular session.
    pub fn nominal_minutes(self) -> f64 {
        match self {
            Horizon::OneHour => 60.0,
            Horizon::FourHours => 240.0,
            Horizon::EndOfDay => 390.0,
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Horizon {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1hr" => Ok(Horizon::OneHour),
            "4hr" => Ok(Horizon::FourHours),
            "eod" => Ok(Horizon::EndOfDay),
            other => Err(AppError::Validation(format!("unknown horizon '{other}'"))),
        }
    }
}

/// A forecast issued for one link and horizon at one instant. Immutable once
/// written; corrections are new rows at later instants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: i64,
    pub link_id: i64,
    pub horizon: Horizon,
    pub gk_prob: Option<f64>,
    pub predicted_pct: Option<f64>,
    pub prediction_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A realized percentage move measured after the horizon elapsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actual {
    pub id: i64,
    pub link_id: i64,
    pub horizon: Horizon,
    pub actual_pct: f64,
    pub computed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// One actual matched to the latest prediction issued at or before the
/// moment the outcome was measured, or to nothing when the outcome arrived
/// before scoring caught up.
#[derive(Debug, Clone)]
pub struct EvaluatedPair {
    pub actual: Actual,
    pub prediction: Option<Prediction>,
}

impl EvaluatedPair {
    /// Signed forecast error, when a matched prediction carries a value.
    pub fn error_pct(&self) -> Option<f64> {
        let predicted = self.prediction.as_ref()?.predicted_pct?;
        Some(predicted - self.actual.actual_pct)
    }
}
