use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{Actual, EvaluatedPair, Horizon, Prediction};

/// One realized-move measurement, ready to record.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub link_id: i64,
    pub horizon: Horizon,
    pub actual_pct: f64,
    pub computed_at: DateTime<Utc>,
}

/// Records realized outcomes and matches them back to the predictions they
/// evaluate.
pub struct OutcomeReconciler {
    repo: Arc<Repository>,
}

impl OutcomeReconciler {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// Idempotent on (link, horizon, computed_at); redelivery of the same
    /// measurement returns the existing row id.
    pub async fn record_actual(
        &self,
        link_id: i64,
        horizon: Horizon,
        actual_pct: f64,
        computed_at: DateTime<Utc>,
    ) -> Result<i64> {
        if !actual_pct.is_finite() {
            return Err(AppError::Validation(
                "actual percentage move must be finite".into(),
            ));
        }
        self.repo
            .insert_actual(link_id, horizon, actual_pct, computed_at)
            .await
    }

    /// Record a batch of measurements, each idempotently.
    pub async fn record_actuals(
        &self,
        measurements: impl IntoIterator<Item = Measurement>,
    ) -> Result<Vec<i64>> {
        let mut ids = Vec::new();
        for m in measurements {
            ids.push(
                self.record_actual(m.link_id, m.horizon, m.actual_pct, m.computed_at)
                    .await?,
            );
        }
        Ok(ids)
    }

    /// Pair every actual for the link/horizon with the latest prediction
    /// issued at or before the moment the outcome was measured. Actuals
    /// that arrived before any prediction come back unmatched. The result
    /// is a single-pass sequence ordered by computed_at ascending.
    pub async fn evaluate(
        &self,
        link_id: i64,
        horizon: Horizon,
    ) -> Result<impl Iterator<Item = EvaluatedPair>> {
        let predictions = self.repo.predictions_for(link_id, horizon).await?;
        let actuals = self.repo.actuals_for(link_id, horizon).await?;
        Ok(pair_outcomes(predictions, actuals).into_iter())
    }
}

/// Merge two time-ordered sequences: for each actual, the match is the
/// newest prediction with prediction_time <= computed_at. A prediction made
/// after the outcome it would measure is never eligible.
fn pair_outcomes(predictions: Vec<Prediction>, actuals: Vec<Actual>) -> Vec<EvaluatedPair> {
    let mut pairs = Vec::with_capacity(actuals.len());
    let mut next = 0;
    let mut latest: Option<&Prediction> = None;

    for actual in actuals {
        while next < predictions.len() && predictions[next].prediction_time <= actual.computed_at {
            latest = Some(&predictions[next]);
            next += 1;
        }
        pairs.push(EvaluatedPair {
            prediction: latest.cloned(),
            actual,
        });
    }
    pairs
}
