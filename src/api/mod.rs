//! API module - Axum HTTP servers and routes
//!
//! Two routers, one per binary: the webhook receiver and the news service.

mod news;
mod webhook;

use crate::broker::dispatcher::OrderDispatcher;
use crate::db::Database;
use crate::news::NewsFetcher;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// State shared by the webhook server handlers
pub struct TradeState {
    pub dispatcher: OrderDispatcher,
}

/// State shared by the news server handlers
pub struct NewsState {
    pub db: Database,
    pub fetcher: NewsFetcher,
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Router for the TradingView webhook receiver
pub fn trade_router(state: Arc<TradeState>) -> Router {
    Router::new()
        .route("/", post(webhook::receive_alert))
        .route("/health", get(webhook::health_check))
        .layer(cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Router for the news ingestion/query service
pub fn news_router(state: Arc<NewsState>) -> Router {
    Router::new()
        .route("/news/update/:tickers", get(news::update_news))
        .route("/news/:tickers", get(news::ticker_news))
        .route("/health", get(news::health_check))
        .layer(cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
