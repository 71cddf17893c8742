pub const SCHEMA: &str = r#"
-- articles table: one row per de-duplicated news item
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT,
    url_hash TEXT NOT NULL UNIQUE,
    headline TEXT NOT NULL,
    source TEXT,
    published_dt TEXT,
    scraped_html TEXT,
    full_text TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_articles_published_dt ON articles(published_dt);

-- tickers table: append-only symbol dictionary
CREATE TABLE IF NOT EXISTS tickers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL UNIQUE
);

-- article_tickers table: one row per (article, ticker) pair, carrying
-- extraction evidence and all sentiment scores
CREATE TABLE IF NOT EXISTS article_tickers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
    ticker_id INTEGER NOT NULL REFERENCES tickers(id) ON DELETE CASCADE,
    mentions INTEGER NOT NULL DEFAULT 0,
    pos_kw INTEGER NOT NULL DEFAULT 0,
    neg_kw INTEGER NOT NULL DEFAULT 0,
    tokens TEXT,
    sentiment_dynamic REAL,
    sentiment_ml REAL,
    sentiment_keyword REAL,
    sentiment_combined REAL,
    headline_sentiment REAL,
    market_session TEXT,
    news_age_minutes REAL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(article_id, ticker_id)
);

CREATE INDEX IF NOT EXISTS idx_article_tickers_article_id ON article_tickers(article_id);
CREATE INDEX IF NOT EXISTS idx_article_tickers_ticker_id ON article_tickers(ticker_id);

-- predictions table: immutable forecasts, one per (link, horizon, instant)
CREATE TABLE IF NOT EXISTS predictions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    article_ticker_id INTEGER NOT NULL REFERENCES article_tickers(id) ON DELETE CASCADE,
    horizon TEXT NOT NULL CHECK (horizon IN ('1hr', '4hr', 'eod')),
    gk_prob REAL,
    predicted_pct REAL,
    prediction_time TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(article_ticker_id, horizon, prediction_time)
);

CREATE INDEX IF NOT EXISTS idx_predictions_horizon ON predictions(horizon);
CREATE INDEX IF NOT EXISTS idx_predictions_time ON predictions(prediction_time);

-- actuals table: immutable realized moves, one per (link, horizon, instant)
CREATE TABLE IF NOT EXISTS actuals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    article_ticker_id INTEGER NOT NULL REFERENCES article_tickers(id) ON DELETE CASCADE,
    horizon TEXT NOT NULL CHECK (horizon IN ('1hr', '4hr', 'eod')),
    actual_pct REAL NOT NULL,
    computed_at TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(article_ticker_id, horizon, computed_at)
);
"#;
