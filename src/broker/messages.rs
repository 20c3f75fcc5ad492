//! cTrader Open API message types (JSON-over-WebSocket encoding)
//!
//! Every frame is an envelope `{clientMsgId?, payloadType, payload}`.
//! Inbound frames decode into the [`BrokerMessage`] sum type so the session
//! can match on message kind exhaustively; unknown payload types survive
//! decoding as [`BrokerMessage::Unknown`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

// Payload type codes from the Open API protocol
pub const PROTO_HEARTBEAT_EVENT: u32 = 51;
pub const PROTO_OA_APPLICATION_AUTH_REQ: u32 = 2100;
pub const PROTO_OA_APPLICATION_AUTH_RES: u32 = 2101;
pub const PROTO_OA_ACCOUNT_AUTH_REQ: u32 = 2102;
pub const PROTO_OA_ACCOUNT_AUTH_RES: u32 = 2103;
pub const PROTO_OA_NEW_ORDER_REQ: u32 = 2106;
pub const PROTO_OA_SYMBOLS_LIST_REQ: u32 = 2114;
pub const PROTO_OA_SYMBOLS_LIST_RES: u32 = 2115;
pub const PROTO_OA_EXECUTION_EVENT: u32 = 2126;
pub const PROTO_OA_ERROR_RES: u32 = 2142;

// ProtoOAOrderType
pub const ORDER_TYPE_MARKET: i32 = 1;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationAuthReq {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountAuthReq {
    pub ctid_trader_account_id: i64,
    pub access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountAuthRes {
    pub ctid_trader_account_id: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolsListReq {
    pub ctid_trader_account_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightSymbol {
    pub symbol_id: i64,
    #[serde(default)]
    pub symbol_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolsListRes {
    #[serde(default)]
    pub symbol: Vec<LightSymbol>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderReq {
    pub ctid_trader_account_id: i64,
    pub symbol_id: i64,
    /// ProtoOAOrderType numeric value
    pub order_type: i32,
    /// ProtoOATradeSide numeric value
    pub trade_side: i32,
    pub volume: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRes {
    pub error_code: String,
    #[serde(default)]
    pub description: String,
}

/// Inbound message kinds the session dispatches on
#[derive(Debug)]
pub enum BrokerMessage {
    ApplicationAuthRes,
    AccountAuthRes(AccountAuthRes),
    SymbolsList(SymbolsListRes),
    Execution(Value),
    Error(ErrorRes),
    Heartbeat,
    Unknown(u32),
}

/// Decoded inbound frame: message plus the echoed correlation id, if any
#[derive(Debug)]
pub struct Inbound {
    pub client_msg_id: Option<String>,
    pub message: BrokerMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InboundEnvelope {
    client_msg_id: Option<String>,
    payload_type: u32,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutboundEnvelope<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    client_msg_id: Option<&'a str>,
    payload_type: u32,
    payload: Value,
}

pub fn decode(text: &str) -> Result<Inbound, serde_json::Error> {
    let envelope: InboundEnvelope = serde_json::from_str(text)?;
    let message = match envelope.payload_type {
        PROTO_OA_APPLICATION_AUTH_RES => BrokerMessage::ApplicationAuthRes,
        PROTO_OA_ACCOUNT_AUTH_RES => {
            BrokerMessage::AccountAuthRes(serde_json::from_value(envelope.payload)?)
        }
        PROTO_OA_SYMBOLS_LIST_RES => {
            BrokerMessage::SymbolsList(serde_json::from_value(envelope.payload)?)
        }
        PROTO_OA_EXECUTION_EVENT => BrokerMessage::Execution(envelope.payload),
        PROTO_OA_ERROR_RES => BrokerMessage::Error(serde_json::from_value(envelope.payload)?),
        PROTO_HEARTBEAT_EVENT => BrokerMessage::Heartbeat,
        other => BrokerMessage::Unknown(other),
    };
    Ok(Inbound {
        client_msg_id: envelope.client_msg_id,
        message,
    })
}

/// Outbound request kinds
#[derive(Debug, Clone)]
pub enum OutgoingRequest {
    ApplicationAuth(ApplicationAuthReq),
    AccountAuth(AccountAuthReq),
    SymbolsList(SymbolsListReq),
    NewOrder(NewOrderReq),
    Heartbeat,
}

impl OutgoingRequest {
    pub fn payload_type(&self) -> u32 {
        match self {
            OutgoingRequest::ApplicationAuth(_) => PROTO_OA_APPLICATION_AUTH_REQ,
            OutgoingRequest::AccountAuth(_) => PROTO_OA_ACCOUNT_AUTH_REQ,
            OutgoingRequest::SymbolsList(_) => PROTO_OA_SYMBOLS_LIST_REQ,
            OutgoingRequest::NewOrder(_) => PROTO_OA_NEW_ORDER_REQ,
            OutgoingRequest::Heartbeat => PROTO_HEARTBEAT_EVENT,
        }
    }

    /// Serialize the request into its wire frame
    pub fn encode(&self, client_msg_id: Option<&str>) -> Result<String, serde_json::Error> {
        let payload = match self {
            OutgoingRequest::ApplicationAuth(req) => serde_json::to_value(req)?,
            OutgoingRequest::AccountAuth(req) => serde_json::to_value(req)?,
            OutgoingRequest::SymbolsList(req) => serde_json::to_value(req)?,
            OutgoingRequest::NewOrder(req) => serde_json::to_value(req)?,
            OutgoingRequest::Heartbeat => Value::Object(Default::default()),
        };
        serde_json::to_string(&OutboundEnvelope {
            client_msg_id,
            payload_type: self.payload_type(),
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_account_auth_res() {
        let frame = r#"{"payloadType":2103,"payload":{"ctidTraderAccountId":12345}}"#;
        let inbound = decode(frame).unwrap();
        match inbound.message {
            BrokerMessage::AccountAuthRes(res) => assert_eq!(res.ctid_trader_account_id, 12345),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_decode_error_res_with_correlation() {
        let frame = r#"{"clientMsgId":"abc-1","payloadType":2142,"payload":{"errorCode":"CH_CLIENT_AUTH_FAILURE","description":"bad secret"}}"#;
        let inbound = decode(frame).unwrap();
        assert_eq!(inbound.client_msg_id.as_deref(), Some("abc-1"));
        match inbound.message {
            BrokerMessage::Error(err) => {
                assert_eq!(err.error_code, "CH_CLIENT_AUTH_FAILURE");
                assert_eq!(err.description, "bad secret");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_payload_type() {
        let frame = r#"{"payloadType":2199,"payload":{}}"#;
        let inbound = decode(frame).unwrap();
        match inbound.message {
            BrokerMessage::Unknown(payload_type) => assert_eq!(payload_type, 2199),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_decode_symbols_list_missing_fields() {
        // symbolName is optional in the protocol; missing entries decode empty
        let frame = r#"{"payloadType":2115,"payload":{"symbol":[{"symbolId":1,"symbolName":"EURUSD"},{"symbolId":2}]}}"#;
        let inbound = decode(frame).unwrap();
        match inbound.message {
            BrokerMessage::SymbolsList(res) => {
                assert_eq!(res.symbol.len(), 2);
                assert_eq!(res.symbol[0].symbol_name, "EURUSD");
                assert_eq!(res.symbol[1].symbol_name, "");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_encode_new_order() {
        let request = OutgoingRequest::NewOrder(NewOrderReq {
            ctid_trader_account_id: 12345,
            symbol_id: 1,
            order_type: ORDER_TYPE_MARKET,
            trade_side: 1,
            volume: 50000,
            comment: Some("Trade executed via TradingView alert: alert1".to_string()),
        });
        let frame = request.encode(Some("msg-1")).unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["clientMsgId"], "msg-1");
        assert_eq!(value["payloadType"], 2106);
        assert_eq!(value["payload"]["ctidTraderAccountId"], 12345);
        assert_eq!(value["payload"]["tradeSide"], 1);
        assert_eq!(value["payload"]["volume"], 50000);
    }

    #[test]
    fn test_encode_heartbeat_has_no_msg_id() {
        let frame = OutgoingRequest::Heartbeat.encode(None).unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["payloadType"], 51);
        assert!(value.get("clientMsgId").is_none());
    }
}
