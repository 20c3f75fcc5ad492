//! One-shot completion signal
//!
//! Explicit {pending, fulfilled, failed} state machine over a watch channel.
//! A signal fires at most once; later fire/fail calls are no-ops. Fresh
//! signals replace the old pair on every reconnect, never reused.

use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalState {
    Pending,
    Fulfilled,
    Failed(String),
}

/// Completion signal with one-shot fire semantics
#[derive(Debug)]
pub struct OneShotSignal {
    tx: watch::Sender<SignalState>,
}

impl OneShotSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SignalState::Pending);
        Self { tx }
    }

    /// Mark the signal as succeeded. Returns false if it had already fired.
    pub fn fulfill(&self) -> bool {
        self.transition(SignalState::Fulfilled)
    }

    /// Mark the signal as failed. Returns false if it had already fired.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.transition(SignalState::Failed(reason.into()))
    }

    fn transition(&self, next: SignalState) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == SignalState::Pending {
                *state = next;
                true
            } else {
                false
            }
        })
    }

    pub fn is_pending(&self) -> bool {
        *self.tx.borrow() == SignalState::Pending
    }

    pub fn subscribe(&self) -> SignalWaiter {
        SignalWaiter {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for OneShotSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Awaitable side of a signal; resolves once the signal fires
#[derive(Debug)]
pub struct SignalWaiter {
    rx: watch::Receiver<SignalState>,
}

impl SignalWaiter {
    pub async fn wait(mut self) -> Result<(), String> {
        let outcome = match self.rx.wait_for(|state| *state != SignalState::Pending).await {
            Ok(state) => state.clone(),
            // Signal dropped while pending: the session replaced it mid-reset
            Err(_) => SignalState::Failed("connection reset".to_string()),
        };
        match outcome {
            SignalState::Fulfilled => Ok(()),
            SignalState::Failed(reason) => Err(reason),
            SignalState::Pending => Err("signal dropped while pending".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fulfill_resolves_waiters() {
        let signal = OneShotSignal::new();
        let waiter = signal.subscribe();
        assert!(signal.fulfill());
        assert_eq!(waiter.wait().await, Ok(()));
    }

    #[tokio::test]
    async fn test_fire_is_one_shot() {
        let signal = OneShotSignal::new();
        assert!(signal.fulfill());
        // Neither a second fulfill nor a late fail may re-fire
        assert!(!signal.fulfill());
        assert!(!signal.fail("late error"));
        assert_eq!(signal.subscribe().wait().await, Ok(()));
    }

    #[tokio::test]
    async fn test_fail_carries_reason() {
        let signal = OneShotSignal::new();
        assert!(signal.fail("CH_CLIENT_AUTH_FAILURE - bad secret"));
        assert!(!signal.is_pending());
        assert_eq!(
            signal.subscribe().wait().await,
            Err("CH_CLIENT_AUTH_FAILURE - bad secret".to_string())
        );
    }

    #[tokio::test]
    async fn test_subscribe_after_completion_resolves_immediately() {
        let signal = OneShotSignal::new();
        signal.fulfill();
        assert_eq!(signal.subscribe().wait().await, Ok(()));
    }

    #[tokio::test]
    async fn test_dropped_signal_fails_waiters() {
        let signal = OneShotSignal::new();
        let waiter = signal.subscribe();
        drop(signal);
        assert_eq!(waiter.wait().await, Err("connection reset".to_string()));
    }
}
