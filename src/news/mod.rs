//! News provider clients
//!
//! One registry entry per supported provider. Each fetch pulls the
//! news-sentiment feed for a single ticker; per-ticker failures are reported
//! to the caller and never abort a whole update sweep.

use crate::db::FeedItem;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum NewsError {
    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// A supported news-sentiment provider
#[derive(Debug, Clone)]
pub struct Provider {
    pub name: &'static str,
    base_url: &'static str,
    extra_params: &'static [(&'static str, &'static str)],
    api_key: String,
}

/// HTTP client over the provider registry
pub struct NewsFetcher {
    client: reqwest::Client,
    providers: Vec<Provider>,
}

impl NewsFetcher {
    pub fn new(alpha_vantage_api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            providers: vec![Provider {
                name: "ALPHA_VANTAGE",
                base_url: "https://www.alphavantage.co/query",
                extra_params: &[("function", "NEWS_SENTIMENT")],
                api_key: alpha_vantage_api_key,
            }],
        }
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    /// Fetch the feed for one ticker from one provider
    pub async fn fetch_news(
        &self,
        provider: &Provider,
        ticker: &str,
    ) -> Result<Vec<FeedItem>, NewsError> {
        let mut request = self.client.get(provider.base_url);
        for (key, value) in provider.extra_params {
            request = request.query(&[(*key, *value)]);
        }
        let response = request
            .query(&[("tickers", ticker), ("apikey", provider.api_key.as_str())])
            .send()
            .await?;

        let data: Value = response.json().await?;
        debug!("Provider {} responded for ticker {}", provider.name, ticker);
        parse_feed(&data)
    }
}

/// Extract feed items from a provider response body
fn parse_feed(data: &Value) -> Result<Vec<FeedItem>, NewsError> {
    let feed = data
        .get("feed")
        .and_then(|f| f.as_array())
        .ok_or_else(|| NewsError::Malformed("no feed array in response".to_string()))?;

    feed.iter()
        .map(|item| {
            serde_json::from_value(item.clone()).map_err(|e| NewsError::Malformed(e.to_string()))
        })
        .collect()
}
