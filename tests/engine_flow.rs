//! End-to-end flow: ingest an article, link a ticker with evidence, score
//! and combine sentiment, issue predictions, then reconcile them against
//! realized moves.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use stock_pulse::config::CombineWeights;
use stock_pulse::db::Repository;
use stock_pulse::forecast::BaselineModel;
use stock_pulse::models::{Horizon, MentionEvidence, NewArticle};
use stock_pulse::outcome::OutcomeReconciler;
use stock_pulse::pipeline::Pipeline;
use stock_pulse::sentiment::StrategySlots;

fn published_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 14, 0, 0).unwrap()
}

fn acme_article() -> NewArticle {
    NewArticle {
        url: "https://news.example.com/acme-beats-earnings".to_string(),
        headline: "Acme beats earnings".to_string(),
        source: Some("Example Wire".to_string()),
        published_at: Some(published_at()),
        scraped_html: None,
        full_text: Some("Acme Corp posted quarterly profit well above estimates.".to_string()),
    }
}

async fn open_repo(dir: &tempfile::TempDir) -> Arc<Repository> {
    let path = dir.path().join("engine.db");
    Arc::new(Repository::new(path.to_str().unwrap()).await.unwrap())
}

#[tokio::test]
async fn full_pass_from_ingestion_to_reconciliation() {
    let dir = tempfile::tempdir().unwrap();
    let repo = open_repo(&dir).await;

    // Ingestion is idempotent: the second scrape lands on the same row.
    let article_id = repo.ingest_article(acme_article()).await.unwrap();
    assert_eq!(repo.ingest_article(acme_article()).await.unwrap(), article_id);

    let ticker_id = repo.resolve_ticker("ACME").await.unwrap();
    let link_id = repo
        .upsert_link(
            article_id,
            ticker_id,
            MentionEvidence {
                mentions: 3,
                pos_kw: 2,
                neg_kw: 0,
                tokens: vec!["beats".to_string(), "earnings".to_string()],
            },
        )
        .await
        .unwrap();

    let pipeline = Pipeline::new(
        repo.clone(),
        StrategySlots::keyword_only(),
        CombineWeights::default(),
        Box::new(BaselineModel::default()),
    );

    // 14:30 UTC is 09:30 Eastern: the link is scored inside the regular session.
    let t0 = published_at() + Duration::minutes(30);
    pipeline.score_and_predict(link_id, t0).await.unwrap();

    let link = repo.get_link(link_id).await.unwrap().unwrap();
    assert_eq!(link.sentiment_keyword, Some(1.0));
    assert_eq!(link.sentiment_combined, Some(1.0));
    assert_eq!(link.news_age_minutes, Some(30.0));

    // One prediction per horizon, and replaying the pass adds nothing.
    pipeline.score_and_predict(link_id, t0).await.unwrap();
    for horizon in Horizon::ALL {
        assert_eq!(
            repo.predictions_for(link_id, horizon).await.unwrap().len(),
            1
        );
    }

    // An hour later the realized move arrives, twice.
    let reconciler = OutcomeReconciler::new(repo.clone());
    let measured_at = t0 + Duration::minutes(61);
    let actual_id = reconciler
        .record_actual(link_id, Horizon::OneHour, 1.2, measured_at)
        .await
        .unwrap();
    assert_eq!(
        reconciler
            .record_actual(link_id, Horizon::OneHour, 1.2, measured_at)
            .await
            .unwrap(),
        actual_id
    );

    let pairs: Vec<_> = reconciler
        .evaluate(link_id, Horizon::OneHour)
        .await
        .unwrap()
        .collect();
    assert_eq!(pairs.len(), 1);
    let prediction = pairs[0].prediction.as_ref().unwrap();
    assert_eq!(prediction.prediction_time, t0);
    assert!(prediction.prediction_time <= pairs[0].actual.computed_at);
    assert_eq!(pairs[0].actual.actual_pct, 1.2);

    // Other horizons have no outcome yet and evaluate to nothing.
    assert_eq!(
        reconciler
            .evaluate(link_id, Horizon::FourHours)
            .await
            .unwrap()
            .count(),
        0
    );
}

#[tokio::test]
async fn outcomes_arriving_before_scoring_stay_unmatched() {
    let dir = tempfile::tempdir().unwrap();
    let repo = open_repo(&dir).await;

    let article_id = repo.ingest_article(acme_article()).await.unwrap();
    let ticker_id = repo.resolve_ticker("ACME").await.unwrap();
    let link_id = repo
        .upsert_link(article_id, ticker_id, MentionEvidence::default())
        .await
        .unwrap();

    let reconciler = OutcomeReconciler::new(repo.clone());
    reconciler
        .record_actual(
            link_id,
            Horizon::OneHour,
            -0.4,
            published_at() + Duration::minutes(61),
        )
        .await
        .unwrap();

    let pairs: Vec<_> = reconciler
        .evaluate(link_id, Horizon::OneHour)
        .await
        .unwrap()
        .collect();
    assert_eq!(pairs.len(), 1);
    assert!(pairs[0].prediction.is_none());
}

#[tokio::test]
async fn deleting_the_article_erases_the_whole_trail() {
    let dir = tempfile::tempdir().unwrap();
    let repo = open_repo(&dir).await;

    let article_id = repo.ingest_article(acme_article()).await.unwrap();
    let ticker_id = repo.resolve_ticker("ACME").await.unwrap();
    let link_id = repo
        .upsert_link(
            article_id,
            ticker_id,
            MentionEvidence {
                mentions: 1,
                pos_kw: 1,
                neg_kw: 0,
                tokens: Vec::new(),
            },
        )
        .await
        .unwrap();

    let pipeline = Pipeline::new(
        repo.clone(),
        StrategySlots::keyword_only(),
        CombineWeights::default(),
        Box::new(BaselineModel::default()),
    );
    let t0 = published_at() + Duration::minutes(30);
    pipeline.score_and_predict(link_id, t0).await.unwrap();

    let reconciler = OutcomeReconciler::new(repo.clone());
    reconciler
        .record_actual(link_id, Horizon::OneHour, 0.5, t0 + Duration::minutes(61))
        .await
        .unwrap();

    repo.delete_article(article_id).await.unwrap();

    assert!(repo.get_link(link_id).await.unwrap().is_none());
    for horizon in Horizon::ALL {
        assert!(repo.predictions_for(link_id, horizon).await.unwrap().is_empty());
        assert!(repo.actuals_for(link_id, horizon).await.unwrap().is_empty());
    }
    assert!(repo.get_ticker(ticker_id).await.unwrap().is_some());
}
