//! Symbol resolution against the broker's symbols list
//!
//! At most one list request is outstanding at a time. Resolutions are
//! serialized through the session's resolve gate; the slot itself still
//! rejects a second occupant outright. Whichever of response, timeout, or
//! disconnect happens first consumes the slot; the losing paths find it
//! empty and become no-ops.

use super::messages::{OutgoingRequest, SymbolsListReq, SymbolsListRes};
use super::{BrokerError, SessionState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

const SYMBOLS_LIST_TIMEOUT: Duration = Duration::from_secs(10);

/// The single in-flight symbols request
pub(crate) struct PendingSymbols {
    pub(crate) client_msg_id: String,
    pub(crate) tx: oneshot::Sender<Result<SymbolsListRes, BrokerError>>,
}

/// Look up the numeric id of a symbol by exact, case-sensitive name.
pub(crate) async fn resolve(
    state: &Arc<SessionState>,
    symbol_name: &str,
) -> Result<i64, BrokerError> {
    let _gate = state.resolve_gate.lock().await;
    info!("Getting symbol ID for {}", symbol_name);

    let account_id = state
        .account_id
        .read()
        .ok_or(BrokerError::AccountUnresolved)?;

    let msg_id = Uuid::new_v4().to_string();
    let (tx, rx) = oneshot::channel();
    {
        let mut slot = state.pending_symbols.lock();
        if slot.is_some() {
            return Err(BrokerError::ResolverBusy);
        }
        *slot = Some(PendingSymbols {
            client_msg_id: msg_id.clone(),
            tx,
        });
    }

    let request = OutgoingRequest::SymbolsList(SymbolsListReq {
        ctid_trader_account_id: account_id,
    });
    if let Err(e) = state.send(&request, Some(msg_id.clone())) {
        state.pending_symbols.lock().take();
        return Err(e);
    }

    // The timeout future owns the timer; it is dropped (cancelled) on every
    // completion path
    let response = match tokio::time::timeout(SYMBOLS_LIST_TIMEOUT, rx).await {
        Ok(Ok(outcome)) => outcome?,
        Ok(Err(_)) => return Err(BrokerError::Transport("symbols request dropped".to_string())),
        Err(_) => {
            warn!("Timeout while waiting for symbols list");
            let mut slot = state.pending_symbols.lock();
            if slot
                .as_ref()
                .map(|pending| pending.client_msg_id == msg_id)
                .unwrap_or(false)
            {
                slot.take();
            }
            return Err(BrokerError::SymbolTimeout);
        }
    };

    match response
        .symbol
        .iter()
        .find(|entry| entry.symbol_name == symbol_name)
    {
        Some(entry) => {
            info!("Symbol ID for {}: {}", symbol_name, entry.symbol_id);
            Ok(entry.symbol_id)
        }
        None => {
            warn!("Symbol {} not found in the list", symbol_name);
            Err(BrokerError::SymbolNotFound(symbol_name.to_string()))
        }
    }
}

/// Deliver a symbols list to the pending request, if one is still waiting
pub(crate) fn on_symbols_list(state: &Arc<SessionState>, res: SymbolsListRes) {
    info!("Symbols list received: {} symbols", res.symbol.len());
    match state.pending_symbols.lock().take() {
        Some(pending) => {
            let _ = pending.tx.send(Ok(res));
        }
        None => debug!("Symbols list arrived with no pending request, dropping"),
    }
}

/// Fail the pending request. Returns true if there was one to fail.
pub(crate) fn fail_pending(state: &Arc<SessionState>, error: BrokerError) -> bool {
    match state.pending_symbols.lock().take() {
        Some(pending) => {
            let _ = pending.tx.send(Err(error));
            true
        }
        None => false,
    }
}

/// Fail the pending request only if its correlation id matches.
pub(crate) fn fail_if_matching(
    state: &Arc<SessionState>,
    client_msg_id: &str,
    description: &str,
) -> bool {
    let mut slot = state.pending_symbols.lock();
    let matches = slot
        .as_ref()
        .map(|pending| pending.client_msg_id == client_msg_id)
        .unwrap_or(false);
    if !matches {
        return false;
    }
    if let Some(pending) = slot.take() {
        let _ = pending
            .tx
            .send(Err(BrokerError::Transport(description.to_string())));
    }
    true
}
