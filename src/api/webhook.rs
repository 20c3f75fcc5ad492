//! Webhook endpoint handlers
//!
//! Accepts TradingView alert POSTs and forwards them to the order
//! dispatcher. Any failure, including a malformed body, surfaces as a 500
//! with the error's textual description.

use super::TradeState;
use crate::broker::dispatcher::TradeIntent;
use axum::{
    body::Bytes,
    extract::State,
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

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "trade_server",
        "version": "1.0.0"
    }))
}

pub async fn receive_alert(State(state): State<Arc<TradeState>>, body: Bytes) -> Response {
    // Malformed JSON is rejected here, before the dispatcher is involved
    let intent: TradeIntent = match serde_json::from_slice(&body) {
        Ok(intent) => intent,
        Err(e) => {
            error!("Rejected webhook body: {}", e);
            return error_response(&format!("invalid webhook payload: {}", e));
        }
    };
    info!("Received webhook data: {:?}", intent);

    match state.dispatcher.dispatch(&intent).await {
        Ok(()) => {
            info!("Webhook request processed successfully");
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "message": "Trade order sent successfully"
                })),
            )
                .into_response()
        }
        Err(e) => {
            error!("Error processing webhook request: {}", e);
            error_response(&e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::trade_router;
    use crate::broker::dispatcher::OrderDispatcher;
    use crate::broker::testing;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn disconnected_app() -> axum::Router {
        let state = testing::disconnected_state();
        let dispatcher = OrderDispatcher::new(testing::handle_for(&state));
        trade_router(Arc::new(TradeState { dispatcher }))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_malformed_json_yields_500_without_dispatching() {
        let app = disconnected_app();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response.into_response()).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("invalid webhook payload"));
    }

    #[tokio::test]
    async fn test_disconnected_session_yields_500_with_description() {
        let app = disconnected_app();
        let payload = r#"{"symbol":"EURUSD","operation":"buy","amount":0.5,"name":"alert1"}"#;
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header("content-type", "application/json")
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response.into_response()).await;
        assert_eq!(body["error"], "client is not connected");
    }

    #[tokio::test]
    async fn test_successful_dispatch_yields_200_message() {
        use crate::broker::messages::{LightSymbol, SymbolsListRes};

        let (state, mut rx) = testing::connected_state();
        testing::authenticate(&state, 12345);
        let dispatcher = OrderDispatcher::new(testing::handle_for(&state));
        let app = trade_router(Arc::new(TradeState { dispatcher }));

        // Answer the symbols request, then keep the transport side alive
        // until the order frame has gone out
        let responder_state = Arc::clone(&state);
        tokio::spawn(async move {
            let _ = rx.recv().await;
            crate::broker::symbols::on_symbols_list(
                &responder_state,
                SymbolsListRes {
                    symbol: vec![LightSymbol {
                        symbol_id: 1,
                        symbol_name: "EURUSD".to_string(),
                    }],
                },
            );
            let _ = rx.recv().await;
        });

        let payload = r#"{"symbol":"EURUSD","operation":"Buy","amount":0.5,"name":"alert1"}"#;
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header("content-type", "application/json")
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response.into_response()).await;
        assert_eq!(body["message"], "Trade order sent successfully");
    }
}
