//! News service handlers

use super::NewsState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{error, info};

fn error_response(error: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({
            "error": error
        })),
    )
        .into_response()
}

/// Comma-separated path segment into trimmed, non-empty tickers
fn split_tickers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|ticker| ticker.trim().to_string())
        .filter(|ticker| !ticker.is_empty())
        .collect()
}

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "news_server",
        "version": "1.0.0"
    }))
}

/// Refresh stored news for the given tickers from every supported provider.
/// Individual ticker failures are logged and skipped.
pub async fn update_news(
    State(state): State<Arc<NewsState>>,
    Path(tickers): Path<String>,
) -> Response {
    let tickers = split_tickers(&tickers);

    for provider in state.fetcher.providers() {
        for ticker in &tickers {
            match state.fetcher.fetch_news(provider, ticker).await {
                Ok(items) => {
                    let mut inserted = 0usize;
                    for item in &items {
                        match state.db.insert_news(item).await {
                            Ok(()) => inserted += 1,
                            Err(e) => error!(
                                "Failed to store news item {:?} for ticker {}: {}",
                                item.url, ticker, e
                            ),
                        }
                    }
                    info!(
                        "Update ticker data for {} successfully ({} items)",
                        ticker, inserted
                    );
                }
                Err(e) => {
                    error!("News update for ticker {} error: {}", ticker, e);
                }
            }
        }
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({"message": "OK"})),
    )
        .into_response()
}

/// Stored articles mentioning any of the given tickers, newest first
pub async fn ticker_news(
    State(state): State<Arc<NewsState>>,
    Path(tickers): Path<String>,
) -> Response {
    let tickers = split_tickers(&tickers);

    match state.db.news_by_tickers(&tickers).await {
        Ok(articles) => Json(articles).into_response(),
        Err(e) => {
            error!("News query failed: {}", e);
            error_response(&e.to_string())
        }
    }
}
