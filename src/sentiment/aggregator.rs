use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::CombineWeights;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{Article, Strategy, TickerLink};

use super::session::classify_session;
use super::{ScoringInput, SentimentStrategy};

/// One optional scoring function per strategy. Unconfigured slots are
/// skipped, mirroring deployments where only some models are available.
#[derive(Default)]
pub struct StrategySlots {
    pub dynamic: Option<Box<dyn SentimentStrategy>>,
    pub ml: Option<Box<dyn SentimentStrategy>>,
    pub keyword: Option<Box<dyn SentimentStrategy>>,
}

impl StrategySlots {
    pub fn keyword_only() -> Self {
        Self {
            keyword: Some(Box::new(super::KeywordStrategy)),
            ..Self::default()
        }
    }

    fn get(&self, strategy: Strategy) -> Option<&dyn SentimentStrategy> {
        match strategy {
            Strategy::Dynamic => self.dynamic.as_deref(),
            Strategy::Ml => self.ml.as_deref(),
            Strategy::Keyword => self.keyword.as_deref(),
        }
    }
}

/// Computes and stores per-strategy sentiment and the derived combined
/// score for a link. Each strategy writes independently; partial state is
/// valid and expected between passes.
pub struct Aggregator {
    repo: Arc<Repository>,
    slots: StrategySlots,
    weights: CombineWeights,
}

impl Aggregator {
    pub fn new(repo: Arc<Repository>, slots: StrategySlots, weights: CombineWeights) -> Self {
        Self {
            repo,
            slots,
            weights,
        }
    }

    async fn load(&self, link_id: i64) -> Result<(Article, TickerLink)> {
        let link = self
            .repo
            .get_link(link_id)
            .await?
            .ok_or_else(|| AppError::Constraint(format!("no link with id {link_id}")))?;
        let article = self
            .repo
            .get_article(link.article_id)
            .await?
            .ok_or_else(|| {
                AppError::Constraint(format!("link {link_id} references a missing article"))
            })?;
        Ok((article, link))
    }

    /// Run one strategy over the link's article text and store its score.
    /// Returns the stored value, or `None` when the slot is unconfigured or
    /// the strategy had nothing to say.
    pub async fn score(&self, link_id: i64, strategy: Strategy) -> Result<Option<f64>> {
        let (article, link) = self.load(link_id).await?;

        let Some(model) = self.slots.get(strategy) else {
            debug!("strategy {strategy} not configured, skipping link {link_id}");
            return Ok(None);
        };

        let input = ScoringInput {
            headline: &article.headline,
            body: article.body_text(),
            link: &link,
        };
        let Some(value) = model.score(&input)? else {
            return Ok(None);
        };

        if !value.is_finite() {
            return Err(AppError::Model(format!(
                "strategy {strategy} returned a non-finite score"
            )));
        }

        let value = value.clamp(-1.0, 1.0);
        self.repo.set_strategy_score(link_id, strategy, value).await?;
        Ok(Some(value))
    }

    /// Score the headline alone. This is an overlay signal stored beside
    /// the body strategies and never folded into the combined score. Uses
    /// the dynamic (lexicon) slot, the one fast enough for headlines.
    pub async fn score_headline(&self, link_id: i64) -> Result<Option<f64>> {
        let (article, link) = self.load(link_id).await?;

        let Some(model) = self.slots.get(Strategy::Dynamic) else {
            return Ok(None);
        };

        let input = ScoringInput {
            headline: &article.headline,
            body: &article.headline,
            link: &link,
        };
        let Some(value) = model.score(&input)? else {
            return Ok(None);
        };

        if !value.is_finite() {
            return Err(AppError::Model(
                "headline strategy returned a non-finite score".into(),
            ));
        }

        let value = value.clamp(-1.0, 1.0);
        self.repo.set_headline_sentiment(link_id, value).await?;
        Ok(Some(value))
    }

    /// Recompute the combined score from whichever strategies have values,
    /// stamping market session and news age as of `now`. Idempotent: the
    /// stored value is derived and simply overwritten on every run.
    pub async fn combine(&self, link_id: i64, now: DateTime<Utc>) -> Result<f64> {
        let (article, link) = self.load(link_id).await?;

        let mut weight_sum = 0.0;
        let mut total = 0.0;
        for strategy in Strategy::ALL {
            if let Some(value) = link.strategy_score(strategy) {
                let weight = self.weights.weight(strategy);
                weight_sum += weight;
                total += value * weight;
            }
        }
        if weight_sum <= 0.0 {
            return Err(AppError::IncompleteEvidence(format!(
                "link {link_id} has no strategy scores to combine"
            )));
        }
        let combined = total / weight_sum;

        let session = classify_session(now);
        let basis = article.published_at.unwrap_or(article.created_at);
        let mut age_minutes = (now - basis).num_seconds() as f64 / 60.0;
        if age_minutes < 0.0 {
            warn!(
                "article {} published {:.1} minutes in the future, clamping news age to zero",
                article.id, -age_minutes
            );
            age_minutes = 0.0;
        }

        self.repo
            .set_combined(link_id, combined, session, age_minutes)
            .await?;
        Ok(combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MarketSession, MentionEvidence, NewArticle};
    use chrono::{Duration, TimeZone};

    fn published_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 14, 0, 0).unwrap()
    }

    async fn seeded_link(repo: &Arc<Repository>) -> i64 {
        let article_id = repo
            .ingest_article(NewArticle {
                url: "https://news.example.com/acme-earnings".to_string(),
                headline: "Acme beats earnings".to_string(),
                source: None,
                published_at: Some(published_at()),
                scraped_html: None,
                full_text: None,
            })
            .await
            .unwrap();
        let ticker_id = repo.resolve_ticker("ACME").await.unwrap();
        repo.upsert_link(
            article_id,
            ticker_id,
            MentionEvidence {
                mentions: 3,
                pos_kw: 2,
                neg_kw: 0,
                tokens: vec!["beats".to_string()],
            },
        )
        .await
        .unwrap()
    }

    async fn test_repo() -> (tempfile::TempDir, Arc<Repository>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let repo = Arc::new(Repository::new(path.to_str().unwrap()).await.unwrap());
        (dir, repo)
    }

    fn fixed(value: f64) -> Option<Box<dyn SentimentStrategy>> {
        Some(Box::new(move |_: &ScoringInput<'_>| -> Result<Option<f64>> {
            Ok(Some(value))
        }))
    }

    #[tokio::test]
    async fn combine_with_single_strategy_passes_it_through() {
        let (_dir, repo) = test_repo().await;
        let link_id = seeded_link(&repo).await;

        let aggregator = Aggregator::new(
            repo.clone(),
            StrategySlots {
                dynamic: fixed(0.6),
                ..StrategySlots::default()
            },
            CombineWeights::default(),
        );

        aggregator.score(link_id, Strategy::Dynamic).await.unwrap();
        let combined = aggregator
            .combine(link_id, published_at() + Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(combined, 0.6);

        let link = repo.get_link(link_id).await.unwrap().unwrap();
        assert!(link.has_any_signal());
        assert_eq!(link.sentiment_combined, Some(0.6));
        assert_eq!(link.sentiment_ml, None);
        assert_eq!(link.sentiment_keyword, None);
        assert_eq!(link.market_session, Some(MarketSession::Regular));
        assert_eq!(link.news_age_minutes, Some(30.0));
    }

    #[tokio::test]
    async fn combine_weights_available_strategies_only() {
        let (_dir, repo) = test_repo().await;
        let link_id = seeded_link(&repo).await;

        let aggregator = Aggregator::new(
            repo.clone(),
            StrategySlots {
                dynamic: fixed(0.8),
                keyword: Some(Box::new(super::super::KeywordStrategy)),
                ..StrategySlots::default()
            },
            CombineWeights::default(),
        );

        aggregator.score(link_id, Strategy::Dynamic).await.unwrap();
        aggregator.score(link_id, Strategy::Keyword).await.unwrap();
        // Keyword evidence is 2 positive, 0 negative -> 1.0; mean of 0.8 and 1.0.
        let combined = aggregator
            .combine(link_id, published_at() + Duration::minutes(5))
            .await
            .unwrap();
        assert!((combined - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn combine_without_any_signal_is_incomplete_evidence() {
        let (_dir, repo) = test_repo().await;
        let link_id = seeded_link(&repo).await;

        let aggregator = Aggregator::new(
            repo.clone(),
            StrategySlots::default(),
            CombineWeights::default(),
        );
        let err = aggregator.combine(link_id, Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::IncompleteEvidence(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn future_publication_clamps_age_with_a_warning() {
        let (_dir, repo) = test_repo().await;
        let link_id = seeded_link(&repo).await;

        let aggregator = Aggregator::new(
            repo.clone(),
            StrategySlots {
                dynamic: fixed(0.1),
                ..StrategySlots::default()
            },
            CombineWeights::default(),
        );
        aggregator.score(link_id, Strategy::Dynamic).await.unwrap();
        aggregator
            .combine(link_id, published_at() - Duration::minutes(10))
            .await
            .unwrap();

        let link = repo.get_link(link_id).await.unwrap().unwrap();
        assert_eq!(link.news_age_minutes, Some(0.0));
    }

    #[tokio::test]
    async fn strategy_failure_leaves_siblings_untouched() {
        let (_dir, repo) = test_repo().await;
        let link_id = seeded_link(&repo).await;

        let aggregator = Aggregator::new(
            repo.clone(),
            StrategySlots {
                dynamic: Some(Box::new(|_: &ScoringInput<'_>| -> Result<Option<f64>> {
                    Err(AppError::Model("model endpoint unreachable".into()))
                })),
                keyword: Some(Box::new(super::super::KeywordStrategy)),
                ..StrategySlots::default()
            },
            CombineWeights::default(),
        );

        let err = aggregator.score(link_id, Strategy::Dynamic).await.unwrap_err();
        assert!(matches!(err, AppError::Model(_)));

        aggregator.score(link_id, Strategy::Keyword).await.unwrap();
        let link = repo.get_link(link_id).await.unwrap().unwrap();
        assert_eq!(link.sentiment_dynamic, None);
        assert_eq!(link.sentiment_keyword, Some(1.0));
    }

    #[tokio::test]
    async fn headline_score_is_stored_separately() {
        let (_dir, repo) = test_repo().await;
        let link_id = seeded_link(&repo).await;

        let aggregator = Aggregator::new(
            repo.clone(),
            StrategySlots {
                dynamic: fixed(0.4),
                ..StrategySlots::default()
            },
            CombineWeights::default(),
        );
        aggregator.score_headline(link_id).await.unwrap();

        let link = repo.get_link(link_id).await.unwrap().unwrap();
        assert_eq!(link.headline_sentiment, Some(0.4));
        // The overlay never feeds the combined score on its own.
        assert_eq!(link.sentiment_combined, None);
    }
}
