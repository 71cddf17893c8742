use crate::error::Result;
use crate::models::{Horizon, MarketSession};

/// Signal snapshot a model turns into a forecast.
#[derive(Debug, Clone)]
pub struct ForecastInput {
    pub combined: f64,
    pub headline: Option<f64>,
    pub session: MarketSession,
    pub news_age_minutes: f64,
    pub horizon: Horizon,
}

#[derive(Debug, Clone, Copy)]
pub struct Forecast {
    pub gk_prob: f64,
    pub predicted_pct: f64,
}

/// Contract for the price-move model: a deterministic function from signal
/// snapshot to a (confidence, predicted move) pair of finite numbers, or a
/// `Model` error.
pub trait ForecastModel: Send + Sync {
    fn forecast(&self, input: &ForecastInput) -> Result<Forecast>;
}

/// Built-in deterministic model: the combined score sets the direction, a
/// freshness half-life and the session damp the magnitude, and the horizon
/// scales it toward the full end-of-session move.
pub struct BaselineModel {
    pub half_life_minutes: f64,
    pub max_move_pct: f64,
}

impl Default for BaselineModel {
    fn default() -> Self {
        Self {
            half_life_minutes: 120.0,
            max_move_pct: 2.0,
        }
    }
}

impl ForecastModel for BaselineModel {
    fn forecast(&self, input: &ForecastInput) -> Result<Forecast> {
        let signal = input.combined.clamp(-1.0, 1.0);
        let freshness = 0.5f64.powf(input.news_age_minutes.max(0.0) / self.half_life_minutes);
        let session_factor = match input.session {
            MarketSession::Regular => 1.0,
            MarketSession::PreMarket => 0.8,
            MarketSession::AfterHours => 0.6,
            MarketSession::Closed => 0.4,
        };
        let horizon_scale =
            input.horizon.nominal_minutes() / Horizon::EndOfDay.nominal_minutes();

        let strength = signal.abs() * freshness * session_factor;
        let gk_prob = (0.5 + 0.45 * strength).clamp(0.05, 0.95);
        let predicted_pct = signal * freshness * session_factor * horizon_scale * self.max_move_pct;

        Ok(Forecast {
            gk_prob,
            predicted_pct,
        })
    }
}
