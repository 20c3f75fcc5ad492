//! News row and provider feed models

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

// Timestamp format used by the provider feed (e.g. "20240101T120000")
const FEED_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Stored news-sentiment row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    pub id: i32,
    pub title: String,
    pub url: String,
    pub time_published: NaiveDateTime,
    pub authors: serde_json::Value,
    pub summary: Option<String>,
    pub banner_image: Option<String>,
    pub source: Option<String>,
    pub category_within_source: Option<String>,
    pub source_domain: Option<String>,
    pub topics: serde_json::Value,
    pub overall_sentiment_score: Option<f64>,
    pub overall_sentiment_label: Option<String>,
    pub ticker_sentiment: serde_json::Value,
}

impl<'r> FromRow<'r, PgRow> for NewsArticle {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            url: row.try_get("url")?,
            time_published: row.try_get("timePublished")?,
            authors: row.try_get("authors").unwrap_or(serde_json::Value::Null),
            summary: row.try_get("summary").ok(),
            banner_image: row.try_get("bannerImage").ok(),
            source: row.try_get("source").ok(),
            category_within_source: row.try_get("categoryWithinSource").ok(),
            source_domain: row.try_get("sourceDomain").ok(),
            topics: row.try_get("topics").unwrap_or(serde_json::Value::Null),
            overall_sentiment_score: row.try_get("overallSentimentScore").ok(),
            overall_sentiment_label: row.try_get("overallSentimentLabel").ok(),
            ticker_sentiment: row
                .try_get("tickerSentiment")
                .unwrap_or(serde_json::Value::Null),
        })
    }
}

fn empty_array() -> serde_json::Value {
    serde_json::Value::Array(Vec::new())
}

/// One item of a provider's news-sentiment feed
#[derive(Debug, Clone, Deserialize)]
pub struct FeedItem {
    pub title: String,
    pub url: String,
    pub time_published: String,
    #[serde(default = "empty_array")]
    pub authors: serde_json::Value,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub banner_image: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub category_within_source: Option<String>,
    #[serde(default)]
    pub source_domain: Option<String>,
    #[serde(default = "empty_array")]
    pub topics: serde_json::Value,
    #[serde(default)]
    pub overall_sentiment_score: Option<f64>,
    #[serde(default)]
    pub overall_sentiment_label: Option<String>,
    #[serde(default = "empty_array")]
    pub ticker_sentiment: serde_json::Value,
}

impl FeedItem {
    /// Parse the provider's compact timestamp
    pub fn published_at(&self) -> Result<NaiveDateTime, chrono::ParseError> {
        NaiveDateTime::parse_from_str(&self.time_published, FEED_TIME_FORMAT)
    }
}
