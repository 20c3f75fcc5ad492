//! Database module for PostgreSQL operations using SQLx
//! Uses runtime query checking (no compile-time DATABASE_URL needed)

mod models;

pub use models::*;

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Database connection wrapper for the news store
#[derive(Clone)]
pub struct Database {
    pool: Arc<PgPool>,
    news_table: String,
}

impl Database {
    /// Create a new database connection pool
    pub async fn new(database_url: &str, news_table: &str) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        info!("Database pool created with max 10 connections");

        Ok(Self {
            pool: Arc::new(pool),
            news_table: news_table.to_string(),
        })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert one provider feed item
    pub async fn insert_news(&self, item: &FeedItem) -> Result<(), DbError> {
        let published = item.published_at().map_err(|e| {
            DbError::InvalidData(format!(
                "unparseable time_published {:?}: {}",
                item.time_published, e
            ))
        })?;

        let sql = format!(
            r#"
            INSERT INTO "{}" (
                title, url, "timePublished", authors, summary, "bannerImage",
                source, "categoryWithinSource", "sourceDomain", topics,
                "overallSentimentScore", "overallSentimentLabel", "tickerSentiment"
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13
            )
            "#,
            self.news_table
        );

        sqlx::query(&sql)
            .bind(&item.title)
            .bind(&item.url)
            .bind(published)
            .bind(&item.authors)
            .bind(&item.summary)
            .bind(&item.banner_image)
            .bind(&item.source)
            .bind(&item.category_within_source)
            .bind(&item.source_domain)
            .bind(&item.topics)
            .bind(item.overall_sentiment_score)
            .bind(&item.overall_sentiment_label)
            .bind(&item.ticker_sentiment)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    /// Fetch stored articles mentioning any of the given tickers, newest first.
    /// Membership is tested against the `tickerSentiment` JSONB array.
    pub async fn news_by_tickers(&self, tickers: &[String]) -> Result<Vec<NewsArticle>, DbError> {
        if tickers.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT * FROM "{}"
            WHERE {}
            ORDER BY "timePublished" DESC
            "#,
            self.news_table,
            ticker_conditions(tickers.len())
        );
        debug!("Executing SQL: {}", sql);

        let mut query = sqlx::query(&sql);
        for ticker in tickers {
            query = query.bind(ticker);
        }
        let rows = query.fetch_all(self.pool()).await?;

        if rows.is_empty() {
            warn!("Query returned no results for tickers {:?}", tickers);
        }

        let articles = rows
            .iter()
            .map(NewsArticle::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        info!("Fetched {} news rows", articles.len());
        Ok(articles)
    }
}

/// OR-joined EXISTS clauses, one placeholder per ticker
fn ticker_conditions(count: usize) -> String {
    (0..count)
        .map(|i| {
            format!(
                r#"EXISTS (SELECT 1 FROM jsonb_array_elements("tickerSentiment") AS item WHERE item->>'ticker' = ${})"#,
                i + 1
            )
        })
        .collect::<Vec<_>>()
        .join(" OR ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_conditions_number_placeholders() {
        let clause = ticker_conditions(2);
        assert!(clause.contains("item->>'ticker' = $1"));
        assert!(clause.contains("item->>'ticker' = $2"));
        assert_eq!(clause.matches(" OR ").count(), 1);
    }

    #[test]
    fn test_ticker_conditions_single() {
        let clause = ticker_conditions(1);
        assert!(!clause.contains(" OR "));
        assert!(clause.starts_with("EXISTS"));
    }
}
