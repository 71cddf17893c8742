use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::config::CombineWeights;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::forecast::{ForecastModel, PredictionEngine};
use crate::models::Strategy;
use crate::sentiment::{Aggregator, StrategySlots};

/// Orchestrates one scoring pass per link: strategies, headline overlay,
/// combination, then one prediction per horizon. Stages are independently
/// retryable, so everything short of an integrity or storage failure is
/// logged and skipped rather than propagated.
pub struct Pipeline {
    repo: Arc<Repository>,
    aggregator: Aggregator,
    engine: PredictionEngine,
}

impl Pipeline {
    pub fn new(
        repo: Arc<Repository>,
        slots: StrategySlots,
        weights: CombineWeights,
        model: Box<dyn ForecastModel>,
    ) -> Self {
        let aggregator = Aggregator::new(repo.clone(), slots, weights);
        let engine = PredictionEngine::new(repo.clone(), model);
        Self {
            repo,
            aggregator,
            engine,
        }
    }

    /// Full pass over one link at `now`. Returns Ok even when some stages
    /// were skipped; only fatal errors come back as Err.
    pub async fn score_and_predict(&self, link_id: i64, now: DateTime<Utc>) -> Result<()> {
        for strategy in Strategy::ALL {
            match self.aggregator.score(link_id, strategy).await {
                Ok(_) => {}
                Err(e) if is_fatal(&e) => return Err(e),
                Err(e) => warn!("strategy {strategy} failed on link {link_id}: {e}"),
            }
        }

        match self.aggregator.score_headline(link_id).await {
            Ok(_) => {}
            Err(e) if is_fatal(&e) => return Err(e),
            Err(e) => warn!("headline scoring failed on link {link_id}: {e}"),
        }

        match self.aggregator.combine(link_id, now).await {
            Ok(_) => {}
            Err(AppError::IncompleteEvidence(_)) => {
                debug!("link {link_id} has no signal yet, combination deferred");
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        for (horizon, result) in self.engine.predict_all_horizons(link_id, now).await {
            match result {
                Ok(_) => {}
                Err(e) if is_fatal(&e) => return Err(e),
                Err(e) => warn!("prediction for horizon {horizon} failed on link {link_id}: {e}"),
            }
        }

        Ok(())
    }

    /// Score every link that has no combined sentiment yet, a few at a
    /// time. Returns how many links were processed.
    pub async fn rescore_pending(&self, now: DateTime<Utc>) -> Result<usize> {
        let ids = self.repo.unscored_link_ids().await?;
        let total = ids.len();
        debug!("rescoring {total} pending links");

        let outcomes: Vec<Result<()>> = stream::iter(ids)
            .map(|id| self.score_and_predict(id, now))
            .buffer_unordered(5) // Max 5 links in flight
            .collect()
            .await;

        for outcome in outcomes {
            outcome?;
        }
        Ok(total)
    }
}

/// Integrity and storage failures halt the batch; everything else is a
/// per-stage condition the next pass can retry.
fn is_fatal(err: &AppError) -> bool {
    matches!(err, AppError::Constraint(_) | AppError::Database(_))
}
