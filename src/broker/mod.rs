//! cTrader Open API session
//!
//! Owns the persistent WebSocket connection and all session state. Inbound
//! frames are decoded into [`messages::BrokerMessage`] and dispatched by kind
//! to exactly one handler; unrecognized kinds are logged and dropped. On any
//! disconnect the session state resets to uninitialized, in-flight work is
//! failed with a disconnect error, and a reconnect is scheduled after a fixed
//! delay, retried indefinitely.

pub mod auth;
pub mod dispatcher;
pub mod messages;
pub mod signal;
pub mod symbols;

use crate::config::BrokerConfig;
use futures_util::{SinkExt, StreamExt};
use messages::{BrokerMessage, OutgoingRequest};
use parking_lot::{Mutex, RwLock};
use signal::{OneShotSignal, SignalWaiter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use symbols::PendingSymbols;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Errors surfaced by the broker session and order pipeline
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("client is not connected")]
    NotConnected,
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("account not authenticated")]
    AccountUnresolved,
    #[error("symbol {0} not found")]
    SymbolNotFound(String),
    #[error("timeout while waiting for symbols list")]
    SymbolTimeout,
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("symbols list request already in flight")]
    ResolverBusy,
    #[error("broker error: {0}")]
    Transport(String),
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Correlation ids of the outstanding auth requests, for error routing
#[derive(Debug, Default)]
pub(crate) struct AuthCorrelation {
    pub(crate) app_auth: Option<String>,
    pub(crate) account_auth: Option<String>,
}

/// Shared session state, reset to uninitialized on every disconnect
pub struct SessionState {
    pub(crate) connected: AtomicBool,
    pub(crate) account_id: RwLock<Option<i64>>,
    pub(crate) app_auth: RwLock<OneShotSignal>,
    pub(crate) account_auth: RwLock<OneShotSignal>,
    pub(crate) outbound: RwLock<Option<mpsc::UnboundedSender<String>>>,
    pub(crate) correlation: Mutex<AuthCorrelation>,
    pub(crate) pending_symbols: Mutex<Option<PendingSymbols>>,
    /// Serializes symbol resolutions so only one list request is in flight
    pub(crate) resolve_gate: tokio::sync::Mutex<()>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            account_id: RwLock::new(None),
            app_auth: RwLock::new(OneShotSignal::new()),
            account_auth: RwLock::new(OneShotSignal::new()),
            outbound: RwLock::new(None),
            correlation: Mutex::new(AuthCorrelation::default()),
            pending_symbols: Mutex::new(None),
            resolve_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Encode and hand a request to the connection task
    pub(crate) fn send(
        &self,
        request: &OutgoingRequest,
        client_msg_id: Option<String>,
    ) -> Result<(), BrokerError> {
        let frame = request.encode(client_msg_id.as_deref())?;
        let outbound = self.outbound.read();
        let tx = outbound.as_ref().ok_or(BrokerError::NotConnected)?;
        tx.send(frame).map_err(|_| BrokerError::NotConnected)
    }
}

/// Cheap clone handle onto the session, used by the dispatcher and handlers
#[derive(Clone)]
pub struct SessionHandle {
    pub(crate) state: Arc<SessionState>,
}

impl SessionHandle {
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    pub fn account_id(&self) -> Option<i64> {
        *self.state.account_id.read()
    }

    pub fn app_auth_waiter(&self) -> SignalWaiter {
        self.state.app_auth.read().subscribe()
    }

    pub fn account_auth_waiter(&self) -> SignalWaiter {
        self.state.account_auth.read().subscribe()
    }

    /// Resolve a symbol name to its broker-assigned numeric id
    pub async fn resolve_symbol(&self, symbol_name: &str) -> Result<i64, BrokerError> {
        symbols::resolve(&self.state, symbol_name).await
    }

    pub(crate) fn send(
        &self,
        request: &OutgoingRequest,
        client_msg_id: Option<String>,
    ) -> Result<(), BrokerError> {
        self.state.send(request, client_msg_id)
    }
}

/// Persistent session with the cTrader Open API
pub struct BrokerSession {
    config: BrokerConfig,
    state: Arc<SessionState>,
    spawned: AtomicBool,
}

impl BrokerSession {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            state: Arc::new(SessionState::new()),
            spawned: AtomicBool::new(false),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Start the connection task. Idempotent: a no-op while the session task
    /// is already running (the task reconnects on its own after drops).
    pub fn connect(&self) {
        if self
            .spawned
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Broker session already running");
            return;
        }
        let state = Arc::clone(&self.state);
        let config = self.config.clone();
        tokio::spawn(async move {
            run_session(state, config).await;
        });
    }
}

/// Connect-and-reconnect loop; never returns
async fn run_session(state: Arc<SessionState>, config: BrokerConfig) {
    let endpoint = config.endpoint();
    loop {
        match connect_async(endpoint.as_str()).await {
            Ok((ws_stream, _)) => {
                info!("Connected to cTrader API at {}", endpoint);
                let reason = run_connection(&state, &config, ws_stream).await;
                warn!("Disconnected from cTrader API: {}", reason);
                on_disconnected(&state, &reason);
            }
            Err(e) => {
                error!("Failed to connect to {}: {}", endpoint, e);
            }
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

/// Single-connection loop: starts application auth, then pumps frames until
/// the transport drops. Returns the disconnect reason.
async fn run_connection<S>(
    state: &Arc<SessionState>,
    config: &BrokerConfig,
    ws_stream: tokio_tungstenite::WebSocketStream<S>,
) -> String
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut write, mut read) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    *state.outbound.write() = Some(tx);
    state.connected.store(true, Ordering::SeqCst);

    // Application auth starts on transport-level connect
    auth::send_application_auth(state, config);

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_frame(state, config, &text),
                Some(Ok(Message::Ping(data))) => {
                    if write.send(Message::Pong(data)).await.is_err() {
                        return "failed to answer ping".to_string();
                    }
                }
                Some(Ok(Message::Close(_))) => return "closed by server".to_string(),
                Some(Ok(_)) => {}
                Some(Err(e)) => return format!("transport error: {}", e),
                None => return "stream ended".to_string(),
            },
            outgoing = rx.recv() => match outgoing {
                Some(frame) => {
                    if let Err(e) = write.send(Message::Text(frame)).await {
                        return format!("send failed: {}", e);
                    }
                }
                None => return "outbound channel closed".to_string(),
            },
            _ = heartbeat.tick() => {
                if let Err(e) = state.send(&OutgoingRequest::Heartbeat, None) {
                    debug!("Skipping heartbeat: {}", e);
                }
            }
        }
    }
}

/// Dispatch one decoded frame to exactly one handler
fn handle_frame(state: &Arc<SessionState>, config: &BrokerConfig, text: &str) {
    let inbound = match messages::decode(text) {
        Ok(inbound) => inbound,
        Err(e) => {
            warn!("Failed to decode broker frame: {}", e);
            return;
        }
    };
    match inbound.message {
        BrokerMessage::ApplicationAuthRes => auth::on_application_auth(state, config),
        BrokerMessage::AccountAuthRes(res) => auth::on_account_auth(state, res),
        BrokerMessage::SymbolsList(res) => symbols::on_symbols_list(state, res),
        BrokerMessage::Error(err) => auth::route_error(state, inbound.client_msg_id, err),
        BrokerMessage::Execution(event) => info!("Execution event received: {}", event),
        BrokerMessage::Heartbeat => debug!("Heartbeat received"),
        BrokerMessage::Unknown(payload_type) => {
            info!("Dropping message with unhandled payload type {}", payload_type)
        }
    }
}

/// Reset session state to uninitialized and fail everything in flight
fn on_disconnected(state: &Arc<SessionState>, reason: &str) {
    let failure = format!("disconnected from cTrader API: {}", reason);

    state.connected.store(false, Ordering::SeqCst);
    *state.outbound.write() = None;
    *state.account_id.write() = None;
    *state.correlation.lock() = AuthCorrelation::default();

    // Replace both auth signals with fresh pending ones; in-flight waiters
    // observe the failure through the old pair
    let old_app = std::mem::replace(&mut *state.app_auth.write(), OneShotSignal::new());
    old_app.fail(failure.as_str());
    let old_account = std::mem::replace(&mut *state.account_auth.write(), OneShotSignal::new());
    old_account.fail(failure.as_str());

    symbols::fail_pending(state, BrokerError::Transport(failure));
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Session state wired to an in-memory outbound channel, as if connected
    pub(crate) fn connected_state() -> (Arc<SessionState>, mpsc::UnboundedReceiver<String>) {
        let state = Arc::new(SessionState::new());
        let (tx, rx) = mpsc::unbounded_channel();
        *state.outbound.write() = Some(tx);
        state.connected.store(true, Ordering::SeqCst);
        (state, rx)
    }

    pub(crate) fn disconnected_state() -> Arc<SessionState> {
        Arc::new(SessionState::new())
    }

    pub(crate) fn handle_for(state: &Arc<SessionState>) -> SessionHandle {
        SessionHandle {
            state: Arc::clone(state),
        }
    }

    /// Marks the session authenticated with the given account id
    pub(crate) fn authenticate(state: &Arc<SessionState>, account_id: i64) {
        state.app_auth.read().fulfill();
        state.account_auth.read().fulfill();
        *state.account_id.write() = Some(account_id);
    }
}
