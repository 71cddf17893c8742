use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub url: Option<String>,
    pub url_hash: String,
    pub headline: String,
    pub source: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub scraped_html: Option<String>,
    pub full_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Article {
    /// Text a body-level scoring strategy should run on. Falls back to the
    /// headline until the full text has been back-filled.
    pub fn body_text(&self) -> &str {
        self.full_text.as_deref().unwrap_or(&self.headline)
    }
}

/// One scrape of an article, before deduplication by URL fingerprint.
#[derive(Debug, Clone, Default)]
pub struct NewArticle {
    pub url: String,
    pub headline: String,
    pub source: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub scraped_html: Option<String>,
    pub full_text: Option<String>,
}
