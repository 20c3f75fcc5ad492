//! Order dispatch pipeline
//!
//! Translates a webhook alert into a market order. Preconditions are checked
//! in a fixed order: the session must be connected, both auth stages must
//! succeed (awaited, not merely checked), and the account id must be known.
//! Dispatch reports success once the transport accepts the order; execution
//! confirmations arrive separately as events and are not awaited.

use super::messages::{NewOrderReq, OutgoingRequest, ORDER_TYPE_MARKET};
use super::{BrokerError, SessionHandle};
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

/// Units per lot of the broker's volume convention
const LOT_TO_UNITS: f64 = 100_000.0;

/// Inbound webhook alert payload
#[derive(Debug, Clone, Deserialize)]
pub struct TradeIntent {
    pub symbol: String,
    pub operation: String,
    pub amount: f64,
    pub name: String,
}

/// ProtoOATradeSide values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Buy = 1,
    Sell = 2,
}

impl TradeSide {
    /// Parse a webhook side string, case-insensitively
    pub fn parse(operation: &str) -> Result<Self, BrokerError> {
        match operation.to_lowercase().as_str() {
            "buy" => Ok(TradeSide::Buy),
            "sell" => Ok(TradeSide::Sell),
            _ => Err(BrokerError::InvalidOperation(operation.to_string())),
        }
    }

    pub fn as_proto(self) -> i32 {
        self as i32
    }
}

/// Convert a lot amount to broker volume units, truncating toward zero
pub fn lot_volume(amount: f64) -> i64 {
    (amount * LOT_TO_UNITS) as i64
}

/// Sends market orders over an authenticated broker session
#[derive(Clone)]
pub struct OrderDispatcher {
    handle: SessionHandle,
}

impl OrderDispatcher {
    pub fn new(handle: SessionHandle) -> Self {
        Self { handle }
    }

    pub async fn dispatch(&self, intent: &TradeIntent) -> Result<(), BrokerError> {
        info!(
            "Starting trade execution for {} {} {}",
            intent.operation, intent.amount, intent.symbol
        );

        if !self.handle.is_connected() {
            error!("Client is not connected");
            return Err(BrokerError::NotConnected);
        }

        self.handle
            .app_auth_waiter()
            .wait()
            .await
            .map_err(BrokerError::AuthenticationFailed)?;
        self.handle
            .account_auth_waiter()
            .wait()
            .await
            .map_err(BrokerError::AuthenticationFailed)?;

        let account_id = self
            .handle
            .account_id()
            .ok_or(BrokerError::AccountUnresolved)?;

        // Reject bad side strings before anything is sent
        let side = TradeSide::parse(&intent.operation)?;

        let symbol_id = self.handle.resolve_symbol(&intent.symbol).await?;
        let volume = lot_volume(intent.amount);

        let order = OutgoingRequest::NewOrder(NewOrderReq {
            ctid_trader_account_id: account_id,
            symbol_id,
            order_type: ORDER_TYPE_MARKET,
            trade_side: side.as_proto(),
            volume,
            comment: Some(format!(
                "Trade executed via TradingView alert: {}",
                intent.name
            )),
        });
        self.handle.send(&order, Some(Uuid::new_v4().to_string()))?;

        info!("Trade order sent successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::messages::{LightSymbol, SymbolsListRes};
    use crate::broker::testing;
    use serde_json::Value;

    fn intent(symbol: &str, operation: &str, amount: f64) -> TradeIntent {
        TradeIntent {
            symbol: symbol.to_string(),
            operation: operation.to_string(),
            amount,
            name: "alert1".to_string(),
        }
    }

    #[test]
    fn test_trade_side_parsing() {
        assert_eq!(TradeSide::parse("buy").unwrap(), TradeSide::Buy);
        assert_eq!(TradeSide::parse("Buy").unwrap(), TradeSide::Buy);
        assert_eq!(TradeSide::parse("SELL").unwrap(), TradeSide::Sell);
        assert!(matches!(
            TradeSide::parse("hold"),
            Err(BrokerError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_lot_volume_truncates_toward_zero() {
        assert_eq!(lot_volume(0.5), 50000);
        assert_eq!(lot_volume(0.123456), 12345);
        assert_eq!(lot_volume(1.0), 100000);
        assert_eq!(lot_volume(0.999999999), 99999);
    }

    #[tokio::test]
    async fn test_dispatch_fails_immediately_when_disconnected() {
        let state = testing::disconnected_state();
        // Auth signals are pending; dispatch must not wait on them
        let dispatcher = OrderDispatcher::new(testing::handle_for(&state));

        let result = dispatcher.dispatch(&intent("EURUSD", "buy", 0.5)).await;
        assert!(matches!(result, Err(BrokerError::NotConnected)));
    }

    #[tokio::test]
    async fn test_dispatch_rejects_invalid_operation_before_any_send() {
        let (state, mut rx) = testing::connected_state();
        testing::authenticate(&state, 12345);
        let dispatcher = OrderDispatcher::new(testing::handle_for(&state));

        let result = dispatcher.dispatch(&intent("EURUSD", "hold", 0.5)).await;
        match result {
            Err(BrokerError::InvalidOperation(op)) => assert_eq!(op, "hold"),
            other => panic!("unexpected outcome: {:?}", other),
        }
        // Nothing reached the transport, not even a symbols request
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_fails_when_auth_failed() {
        let (state, _rx) = testing::connected_state();
        state.app_auth.read().fail("CH_CLIENT_AUTH_FAILURE - bad secret");
        let dispatcher = OrderDispatcher::new(testing::handle_for(&state));

        let result = dispatcher.dispatch(&intent("EURUSD", "buy", 0.5)).await;
        match result {
            Err(BrokerError::AuthenticationFailed(reason)) => {
                assert_eq!(reason, "CH_CLIENT_AUTH_FAILURE - bad secret")
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispatch_sends_market_order() {
        let (state, mut rx) = testing::connected_state();
        testing::authenticate(&state, 12345);
        let dispatcher = OrderDispatcher::new(testing::handle_for(&state));

        let responder_state = std::sync::Arc::clone(&state);
        let dispatch_task = tokio::spawn(async move {
            dispatcher.dispatch(&intent("EURUSD", "Buy", 0.5)).await
        });

        // First frame is the symbols list request; answer it
        let frame: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["payloadType"], 2114);
        crate::broker::symbols::on_symbols_list(
            &responder_state,
            SymbolsListRes {
                symbol: vec![LightSymbol {
                    symbol_id: 1,
                    symbol_name: "EURUSD".to_string(),
                }],
            },
        );

        // Second frame is the market order itself
        let frame: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["payloadType"], 2106);
        assert_eq!(frame["payload"]["ctidTraderAccountId"], 12345);
        assert_eq!(frame["payload"]["symbolId"], 1);
        assert_eq!(frame["payload"]["orderType"], 1);
        assert_eq!(frame["payload"]["tradeSide"], 1);
        assert_eq!(frame["payload"]["volume"], 50000);
        assert_eq!(
            frame["payload"]["comment"],
            "Trade executed via TradingView alert: alert1"
        );

        assert!(dispatch_task.await.unwrap().is_ok());
    }
}
