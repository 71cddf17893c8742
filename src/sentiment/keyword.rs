use crate::error::Result;

use super::{ScoringInput, SentimentStrategy};

/// Lexicon-ratio strategy over the keyword hits already extracted into the
/// link's evidence counts: (pos - neg) / (pos + neg). Needs no external
/// model, so it can run in any environment.
pub struct KeywordStrategy;

impl SentimentStrategy for KeywordStrategy {
    fn score(&self, input: &ScoringInput<'_>) -> Result<Option<f64>> {
        let pos = input.link.pos_kw;
        let neg = input.link.neg_kw;
        let total = pos + neg;
        if total == 0 {
            return Ok(None);
        }
        Ok(Some((pos - neg) as f64 / total as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TickerLink;
    use chrono::Utc;

    fn link_with_counts(pos_kw: i64, neg_kw: i64) -> TickerLink {
        TickerLink {
            id: 1,
            article_id: 1,
            ticker_id: 1,
            mentions: 1,
            pos_kw,
            neg_kw,
            tokens: Vec::new(),
            sentiment_dynamic: None,
            sentiment_ml: None,
            sentiment_keyword: None,
            sentiment_combined: None,
            headline_sentiment: None,
            market_session: None,
            news_age_minutes: None,
            created_at: Utc::now(),
        }
    }

    fn score_of(pos: i64, neg: i64) -> Option<f64> {
        let link = link_with_counts(pos, neg);
        let input = ScoringInput {
            headline: "",
            body: "",
            link: &link,
        };
        KeywordStrategy.score(&input).unwrap()
    }

    #[test]
    fn ratio_spans_the_normalized_range() {
        assert_eq!(score_of(2, 0), Some(1.0));
        assert_eq!(score_of(0, 3), Some(-1.0));
        assert_eq!(score_of(3, 1), Some(0.5));
    }

    #[test]
    fn no_keyword_hits_means_no_score() {
        assert_eq!(score_of(0, 0), None);
    }
}
