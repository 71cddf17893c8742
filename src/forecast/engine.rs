use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{Horizon, MarketSession};

use super::model::{ForecastInput, ForecastModel};

/// Issues forecasts for links whose combined sentiment is ready. One
/// prediction row per (link, horizon, instant); replaying an instant
/// returns the existing row.
pub struct PredictionEngine {
    repo: Arc<Repository>,
    model: Box<dyn ForecastModel>,
}

impl PredictionEngine {
    pub fn new(repo: Arc<Repository>, model: Box<dyn ForecastModel>) -> Self {
        Self { repo, model }
    }

    pub async fn predict(
        &self,
        link_id: i64,
        horizon: Horizon,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let link = self
            .repo
            .get_link(link_id)
            .await?
            .ok_or_else(|| AppError::Constraint(format!("no link with id {link_id}")))?;

        let combined = link.sentiment_combined.ok_or_else(|| {
            AppError::InsufficientSignal(format!(
                "link {link_id} has no combined sentiment yet"
            ))
        })?;

        let input = ForecastInput {
            combined,
            headline: link.headline_sentiment,
            session: link.market_session.unwrap_or(MarketSession::Closed),
            news_age_minutes: link.news_age_minutes.unwrap_or(0.0),
            horizon,
        };
        let forecast = self.model.forecast(&input)?;

        if !forecast.gk_prob.is_finite() || !forecast.predicted_pct.is_finite() {
            return Err(AppError::Model(format!(
                "forecast model returned non-finite values for horizon {horizon}"
            )));
        }

        self.repo
            .insert_prediction(
                link_id,
                horizon,
                Some(forecast.gk_prob),
                Some(forecast.predicted_pct),
                now,
            )
            .await
    }

    /// One call per horizon in the closed set; a failing horizon never
    /// blocks its siblings, so each result is reported on its own.
    pub async fn predict_all_horizons(
        &self,
        link_id: i64,
        now: DateTime<Utc>,
    ) -> Vec<(Horizon, Result<i64>)> {
        let mut results = Vec::with_capacity(Horizon::ALL.len());
        for horizon in Horizon::ALL {
            results.push((horizon, self.predict(link_id, horizon, now).await));
        }
        results
    }
}
