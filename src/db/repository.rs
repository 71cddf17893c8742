use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use rusqlite::{params, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{
    Actual, Article, Horizon, MarketSession, MentionEvidence, NewArticle, Prediction, Strategy,
    Ticker, TickerLink,
};

use super::schema::SCHEMA;

const SYMBOL_PATTERN: &str = r"^[A-Z][A-Z0-9.\-]{0,9}$";

/// Shared relational store for articles, tickers, links, predictions and
/// actuals. Uniqueness constraints are the only concurrency mechanism:
/// every mutating method is an atomic insert-or-get against its unique key,
/// followed by a keyed re-read, never a check-then-act sequence.
pub struct Repository {
    conn: Connection,
    symbol_re: Regex,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            // Cascading deletes depend on this pragma; it is per-connection.
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        let symbol_re = Regex::new(SYMBOL_PATTERN).expect("symbol pattern is valid");

        Ok(Self { conn, symbol_re })
    }

    // Article store

    /// Insert or revisit an article, keyed by the fingerprint of its
    /// canonicalized URL. Nullable fields are filled once and never
    /// overwritten, so the first scrape stays auditable. Returns the id of
    /// the surviving row.
    pub async fn ingest_article(&self, article: NewArticle) -> Result<i64> {
        if article.headline.trim().is_empty() {
            return Err(AppError::Validation("article headline is empty".into()));
        }

        let url_hash = url_fingerprint(&article.url);
        let hash_for_read = url_hash.clone();

        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO articles (url, url_hash, headline, source, published_dt, scraped_html, full_text)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                       ON CONFLICT(url_hash) DO UPDATE SET
                           source = COALESCE(articles.source, excluded.source),
                           published_dt = COALESCE(articles.published_dt, excluded.published_dt),
                           scraped_html = COALESCE(articles.scraped_html, excluded.scraped_html),
                           full_text = COALESCE(articles.full_text, excluded.full_text)"#,
                    params![
                        article.url,
                        url_hash,
                        article.headline,
                        article.source,
                        article.published_at.map(format_ts),
                        article.scraped_html,
                        article.full_text,
                    ],
                )?;
                let id: Option<i64> = conn
                    .query_row(
                        "SELECT id FROM articles WHERE url_hash = ?1",
                        params![hash_for_read],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(id)
            })
            .await?;

        id.ok_or_else(|| AppError::Conflict("article vanished after upsert".into()))
    }

    pub async fn get_article(&self, id: i64) -> Result<Option<Article>> {
        let article = self
            .conn
            .call(move |conn| {
                let article = conn
                    .query_row(
                        r#"SELECT id, url, url_hash, headline, source, published_dt, scraped_html, full_text, created_at
                           FROM articles WHERE id = ?1"#,
                        params![id],
                        |row| Ok(article_from_row(row)),
                    )
                    .optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    /// Destroys an article and, by cascade, all its links, predictions and
    /// actuals. Atomic per root: fully complete or fully absent.
    pub async fn delete_article(&self, id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM articles WHERE id = ?1", params![id])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Ticker registry

    /// Upsert-by-symbol; symbols are immutable once registered.
    pub async fn resolve_ticker(&self, symbol: &str) -> Result<i64> {
        let sym = symbol.trim().to_uppercase();
        if !self.symbol_re.is_match(&sym) {
            return Err(AppError::Validation(format!(
                "malformed ticker symbol '{symbol}'"
            )));
        }

        let sym_for_read = sym.clone();
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO tickers (symbol) VALUES (?1) ON CONFLICT(symbol) DO NOTHING",
                    params![sym],
                )?;
                let id: Option<i64> = conn
                    .query_row(
                        "SELECT id FROM tickers WHERE symbol = ?1",
                        params![sym_for_read],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(id)
            })
            .await?;

        id.ok_or_else(|| AppError::Conflict("ticker vanished after upsert".into()))
    }

    pub async fn get_ticker(&self, id: i64) -> Result<Option<Ticker>> {
        let ticker = self
            .conn
            .call(move |conn| {
                let ticker = conn
                    .query_row(
                        "SELECT id, symbol FROM tickers WHERE id = ?1",
                        params![id],
                        |row| {
                            Ok(Ticker {
                                id: row.get(0)?,
                                symbol: row.get(1)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(ticker)
            })
            .await?;
        Ok(ticker)
    }

    pub async fn delete_ticker(&self, id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM tickers WHERE id = ?1", params![id])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Mention linker

    /// Upsert the (article, ticker) pair with freshly extracted evidence.
    /// Re-extraction is deterministic, so counts and tokens are replaced,
    /// not accumulated. Sentiment columns are untouched here.
    pub async fn upsert_link(
        &self,
        article_id: i64,
        ticker_id: i64,
        evidence: MentionEvidence,
    ) -> Result<i64> {
        let tokens_json = serde_json::to_string(&evidence.tokens)?;

        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO article_tickers (article_id, ticker_id, mentions, pos_kw, neg_kw, tokens)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                       ON CONFLICT(article_id, ticker_id) DO UPDATE SET
                           mentions = excluded.mentions,
                           pos_kw = excluded.pos_kw,
                           neg_kw = excluded.neg_kw,
                           tokens = excluded.tokens"#,
                    params![
                        article_id,
                        ticker_id,
                        evidence.mentions,
                        evidence.pos_kw,
                        evidence.neg_kw,
                        tokens_json,
                    ],
                )?;
                let id: Option<i64> = conn
                    .query_row(
                        "SELECT id FROM article_tickers WHERE article_id = ?1 AND ticker_id = ?2",
                        params![article_id, ticker_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(id)
            })
            .await?;

        id.ok_or_else(|| AppError::Conflict("link vanished after upsert".into()))
    }

    pub async fn get_link(&self, id: i64) -> Result<Option<TickerLink>> {
        let link = self
            .conn
            .call(move |conn| {
                let link = conn
                    .query_row(
                        &format!("{LINK_COLUMNS} WHERE id = ?1"),
                        params![id],
                        |row| Ok(link_from_row(row)),
                    )
                    .optional()?;
                Ok(link)
            })
            .await?;
        Ok(link)
    }

    pub async fn links_for_article(&self, article_id: i64) -> Result<Vec<TickerLink>> {
        let links = self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare(&format!("{LINK_COLUMNS} WHERE article_id = ?1 ORDER BY id"))?;
                let links = stmt
                    .query_map(params![article_id], |row| Ok(link_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(links)
            })
            .await?;
        Ok(links)
    }

    /// Links that have evidence but no combined score yet; the rescoring
    /// pass feeds on these.
    pub async fn unscored_link_ids(&self) -> Result<Vec<i64>> {
        let ids = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id FROM article_tickers WHERE sentiment_combined IS NULL ORDER BY id",
                )?;
                let ids = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(ids)
            })
            .await?;
        Ok(ids)
    }

    // Sentiment aggregator writes

    /// Write one strategy's score on a link, leaving the siblings alone.
    pub async fn set_strategy_score(
        &self,
        link_id: i64,
        strategy: Strategy,
        score: f64,
    ) -> Result<()> {
        // Column names come from a closed enum, not caller input.
        let sql = format!(
            "UPDATE article_tickers SET {} = ?1 WHERE id = ?2",
            strategy.column()
        );
        let updated = self
            .conn
            .call(move |conn| Ok(conn.execute(&sql, params![score, link_id])?))
            .await?;
        if updated == 0 {
            return Err(AppError::Constraint(format!("no link with id {link_id}")));
        }
        Ok(())
    }

    pub async fn set_headline_sentiment(&self, link_id: i64, score: f64) -> Result<()> {
        let updated = self
            .conn
            .call(move |conn| {
                Ok(conn.execute(
                    "UPDATE article_tickers SET headline_sentiment = ?1 WHERE id = ?2",
                    params![score, link_id],
                )?)
            })
            .await?;
        if updated == 0 {
            return Err(AppError::Constraint(format!("no link with id {link_id}")));
        }
        Ok(())
    }

    /// Overwrite the derived combined score together with the market-timing
    /// context captured when combination ran. Recomputation is idempotent.
    pub async fn set_combined(
        &self,
        link_id: i64,
        combined: f64,
        session: MarketSession,
        news_age_minutes: f64,
    ) -> Result<()> {
        let session_str = session.as_str();
        let updated = self
            .conn
            .call(move |conn| {
                Ok(conn.execute(
                    r#"UPDATE article_tickers
                       SET sentiment_combined = ?1, market_session = ?2, news_age_minutes = ?3
                       WHERE id = ?4"#,
                    params![combined, session_str, news_age_minutes, link_id],
                )?)
            })
            .await?;
        if updated == 0 {
            return Err(AppError::Constraint(format!("no link with id {link_id}")));
        }
        Ok(())
    }

    // Prediction engine writes

    /// Insert-or-get on (link, horizon, prediction_time). Replaying the
    /// same instant returns the existing row id without touching it.
    pub async fn insert_prediction(
        &self,
        link_id: i64,
        horizon: Horizon,
        gk_prob: Option<f64>,
        predicted_pct: Option<f64>,
        prediction_time: DateTime<Utc>,
    ) -> Result<i64> {
        let ts = format_ts(prediction_time);
        let ts_for_read = ts.clone();

        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO predictions (article_ticker_id, horizon, gk_prob, predicted_pct, prediction_time)
                       VALUES (?1, ?2, ?3, ?4, ?5)
                       ON CONFLICT(article_ticker_id, horizon, prediction_time) DO NOTHING"#,
                    params![link_id, horizon.as_str(), gk_prob, predicted_pct, ts],
                )?;
                let id: Option<i64> = conn
                    .query_row(
                        r#"SELECT id FROM predictions
                           WHERE article_ticker_id = ?1 AND horizon = ?2 AND prediction_time = ?3"#,
                        params![link_id, horizon.as_str(), ts_for_read],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(id)
            })
            .await?;

        id.ok_or_else(|| AppError::Conflict("prediction vanished after insert".into()))
    }

    pub async fn predictions_for(&self, link_id: i64, horizon: Horizon) -> Result<Vec<Prediction>> {
        // Canonical RFC 3339 timestamps sort lexicographically in time order.
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, article_ticker_id, horizon, gk_prob, predicted_pct, prediction_time, created_at
                       FROM predictions
                       WHERE article_ticker_id = ?1 AND horizon = ?2
                       ORDER BY prediction_time"#,
                )?;
                let rows = stmt
                    .query_map(params![link_id, horizon.as_str()], |row| {
                        Ok(prediction_from_row(row))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    // Outcome reconciler writes

    /// Insert-or-get on (link, horizon, computed_at); repeated delivery of
    /// the same measurement is a no-op.
    pub async fn insert_actual(
        &self,
        link_id: i64,
        horizon: Horizon,
        actual_pct: f64,
        computed_at: DateTime<Utc>,
    ) -> Result<i64> {
        let ts = format_ts(computed_at);
        let ts_for_read = ts.clone();

        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO actuals (article_ticker_id, horizon, actual_pct, computed_at)
                       VALUES (?1, ?2, ?3, ?4)
                       ON CONFLICT(article_ticker_id, horizon, computed_at) DO NOTHING"#,
                    params![link_id, horizon.as_str(), actual_pct, ts],
                )?;
                let id: Option<i64> = conn
                    .query_row(
                        r#"SELECT id FROM actuals
                           WHERE article_ticker_id = ?1 AND horizon = ?2 AND computed_at = ?3"#,
                        params![link_id, horizon.as_str(), ts_for_read],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(id)
            })
            .await?;

        id.ok_or_else(|| AppError::Conflict("actual vanished after insert".into()))
    }

    pub async fn actuals_for(&self, link_id: i64, horizon: Horizon) -> Result<Vec<Actual>> {
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, article_ticker_id, horizon, actual_pct, computed_at, created_at
                       FROM actuals
                       WHERE article_ticker_id = ?1 AND horizon = ?2
                       ORDER BY computed_at"#,
                )?;
                let rows = stmt
                    .query_map(params![link_id, horizon.as_str()], |row| {
                        Ok(actual_from_row(row))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }
}

const LINK_COLUMNS: &str = r#"SELECT id, article_id, ticker_id, mentions, pos_kw, neg_kw, tokens,
    sentiment_dynamic, sentiment_ml, sentiment_keyword, sentiment_combined,
    headline_sentiment, market_session, news_age_minutes, created_at
    FROM article_tickers"#;

/// Canonical storage format. Fixed microsecond precision keeps the TEXT
/// unique keys on prediction/actual instants bit-stable across replays.
fn format_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2024-01-02T14:00:00.000000Z")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2024-01-02 14:00:00")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

/// Canonical form of a URL for fingerprinting: parsed, fragment dropped,
/// host lowercased by the parser. Unparsable input is fingerprinted as-is
/// after trimming, so redacted or malformed URLs still deduplicate.
fn canonical_url(raw: &str) -> String {
    match url::Url::parse(raw.trim()) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => raw.trim().to_string(),
    }
}

fn url_fingerprint(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_url(raw).as_bytes());
    format!("{:x}", hasher.finalize())
}

fn article_from_row(row: &Row) -> Article {
    Article {
        id: row.get(0).unwrap(),
        url: row.get(1).unwrap(),
        url_hash: row.get(2).unwrap(),
        headline: row.get(3).unwrap(),
        source: row.get(4).unwrap(),
        published_at: row
            .get::<_, Option<String>>(5)
            .unwrap()
            .and_then(|s| parse_datetime(&s)),
        scraped_html: row.get(6).unwrap(),
        full_text: row.get(7).unwrap(),
        created_at: row
            .get::<_, String>(8)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    }
}

fn link_from_row(row: &Row) -> TickerLink {
    TickerLink {
        id: row.get(0).unwrap(),
        article_id: row.get(1).unwrap(),
        ticker_id: row.get(2).unwrap(),
        mentions: row.get(3).unwrap(),
        pos_kw: row.get(4).unwrap(),
        neg_kw: row.get(5).unwrap(),
        tokens: row
            .get::<_, Option<String>>(6)
            .unwrap()
            .map(|s| serde_json::from_str(&s).unwrap_or_default())
            .unwrap_or_default(),
        sentiment_dynamic: row.get(7).unwrap(),
        sentiment_ml: row.get(8).unwrap(),
        sentiment_keyword: row.get(9).unwrap(),
        sentiment_combined: row.get(10).unwrap(),
        headline_sentiment: row.get(11).unwrap(),
        market_session: row
            .get::<_, Option<String>>(12)
            .unwrap()
            .and_then(|s| s.parse().ok()),
        news_age_minutes: row.get(13).unwrap(),
        created_at: row
            .get::<_, String>(14)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    }
}

fn prediction_from_row(row: &Row) -> Prediction {
    Prediction {
        id: row.get(0).unwrap(),
        link_id: row.get(1).unwrap(),
        // The CHECK constraint keeps stored horizons inside the closed set.
        horizon: row.get::<_, String>(2).unwrap().parse().unwrap(),
        gk_prob: row.get(3).unwrap(),
        predicted_pct: row.get(4).unwrap(),
        prediction_time: row
            .get::<_, String>(5)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        created_at: row
            .get::<_, String>(6)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    }
}

fn actual_from_row(row: &Row) -> Actual {
    Actual {
        id: row.get(0).unwrap(),
        link_id: row.get(1).unwrap(),
        horizon: row.get::<_, String>(2).unwrap().parse().unwrap(),
        actual_pct: row.get(3).unwrap(),
        computed_at: row
            .get::<_, String>(4)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        created_at: row
            .get::<_, String>(5)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    }
}
