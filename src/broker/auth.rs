//! Two-stage authentication sequencer
//!
//! Stage 1 authenticates the client application; its success response
//! automatically triggers stage 2, which binds the configured trading
//! account. Each stage completes a one-shot signal the order dispatcher
//! awaits. Error responses are routed by correlation id when the server
//! echoes one, falling back to the earliest unsatisfied stage (app auth,
//! then account auth, then the pending symbols request).

use super::messages::{
    AccountAuthReq, AccountAuthRes, ApplicationAuthReq, ErrorRes, OutgoingRequest,
};
use super::{symbols, BrokerError, SessionState};
use crate::config::BrokerConfig;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

pub(crate) fn send_application_auth(state: &Arc<SessionState>, config: &BrokerConfig) {
    info!("Starting application authentication");
    let request = OutgoingRequest::ApplicationAuth(ApplicationAuthReq {
        client_id: config.client_id.clone(),
        client_secret: config.client_secret.clone(),
    });
    let msg_id = Uuid::new_v4().to_string();
    state.correlation.lock().app_auth = Some(msg_id.clone());
    if let Err(e) = state.send(&request, Some(msg_id)) {
        error!("Error in app authentication: {}", e);
    }
}

fn send_account_auth(state: &Arc<SessionState>, config: &BrokerConfig) {
    info!("Starting account authentication");
    let request = OutgoingRequest::AccountAuth(AccountAuthReq {
        ctid_trader_account_id: config.account_id,
        access_token: config.access_token.clone(),
    });
    let msg_id = Uuid::new_v4().to_string();
    state.correlation.lock().account_auth = Some(msg_id.clone());
    if let Err(e) = state.send(&request, Some(msg_id)) {
        error!("Error in account authentication: {}", e);
    }
}

/// Stage 1 complete: fire the app signal and move on to account auth
pub(crate) fn on_application_auth(state: &Arc<SessionState>, config: &BrokerConfig) {
    info!("Application authenticated successfully");
    state.correlation.lock().app_auth = None;
    state.app_auth.read().fulfill();
    send_account_auth(state, config);
}

/// Stage 2 complete: record the account id and fire the account signal
pub(crate) fn on_account_auth(state: &Arc<SessionState>, res: AccountAuthRes) {
    info!(
        "Account {} authenticated successfully",
        res.ctid_trader_account_id
    );
    state.correlation.lock().account_auth = None;
    *state.account_id.write() = Some(res.ctid_trader_account_id);
    state.account_auth.read().fulfill();
}

/// Route an error response to whichever in-flight operation it belongs to.
///
/// Correlation id first; otherwise the earliest stage whose signal has not
/// yet fired claims the error. Signals never double-fire.
pub(crate) fn route_error(
    state: &Arc<SessionState>,
    client_msg_id: Option<String>,
    err: ErrorRes,
) {
    let description = format!("{} - {}", err.error_code, err.description);
    error!("Error received: {}", description);

    if let Some(id) = client_msg_id {
        enum Stage {
            App,
            Account,
        }
        let matched = {
            let mut correlation = state.correlation.lock();
            if correlation.app_auth.as_deref() == Some(id.as_str()) {
                correlation.app_auth = None;
                Some(Stage::App)
            } else if correlation.account_auth.as_deref() == Some(id.as_str()) {
                correlation.account_auth = None;
                Some(Stage::Account)
            } else {
                None
            }
        };
        match matched {
            Some(Stage::App) => {
                state.app_auth.read().fail(description.as_str());
                return;
            }
            Some(Stage::Account) => {
                state.account_auth.read().fail(description.as_str());
                return;
            }
            None => {
                if symbols::fail_if_matching(state, &id, &description) {
                    return;
                }
                // Unmatched id: fall through to stage-priority routing
            }
        }
    }

    if state.app_auth.read().is_pending() {
        state.app_auth.read().fail(description.as_str());
    } else if state.account_auth.read().is_pending() {
        state.account_auth.read().fail(description.as_str());
    } else if symbols::fail_pending(state, BrokerError::Transport(description.clone())) {
        // claimed by the symbols request
    } else {
        error!("Unhandled error: {}", description);
    }
}
