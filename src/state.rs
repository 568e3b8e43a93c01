use std::sync::Arc;

use rtvi_client_types::TransportState;
use tokio::sync::watch;

use crate::delegate::DelegateHandle;

/// The canonical session state, shared between the client and its transport.
///
/// Every change is checked against [`TransportState::can_transition_to`] and
/// applied atomically. Accepted changes are broadcast to subscribers and
/// reported to the delegate.
#[derive(Clone, Debug)]
pub struct StateCell {
    tx: Arc<watch::Sender<TransportState>>,
    delegate: DelegateHandle,
}

impl StateCell {
    pub fn new(delegate: DelegateHandle) -> Self {
        let (tx, _) = watch::channel(TransportState::Disconnected);
        Self {
            tx: Arc::new(tx),
            delegate,
        }
    }

    pub fn get(&self) -> TransportState {
        *self.tx.borrow()
    }

    /// Moves to `next` if the lifecycle allows it. Returns whether the state changed.
    pub fn set(&self, next: TransportState) -> bool {
        self.transition(|current| current.can_transition_to(next), next)
            .is_ok()
    }

    /// Moves to `next` only if `allowed` accepts the current state and the
    /// lifecycle allows the move. The check and the write happen atomically.
    ///
    /// On success returns the previous state, otherwise the state that blocked
    /// the move.
    pub fn transition<F>(
        &self,
        allowed: F,
        next: TransportState,
    ) -> Result<TransportState, TransportState>
    where
        F: FnOnce(TransportState) -> bool,
    {
        let mut outcome = Err(next);
        let modified = self.tx.send_if_modified(|state| {
            let current = *state;
            if !allowed(current) || !current.can_transition_to(next) {
                outcome = Err(current);
                return false;
            }
            outcome = Ok(current);
            if current == next {
                return false;
            }
            *state = next;
            true
        });

        match outcome {
            Ok(previous) if modified => {
                tracing::info!("transport state: {} -> {}", previous, next);
                self.delegate
                    .notify(|delegate| delegate.on_transport_state_changed(next));
            }
            Ok(_) => {}
            Err(current) => {
                tracing::warn!("ignoring transport state change: {} -> {}", current, next);
            }
        }
        outcome
    }

    /// A receiver that observes every accepted state change.
    pub fn subscribe(&self) -> watch::Receiver<TransportState> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_backward_moves() {
        let state = StateCell::new(DelegateHandle::new());
        assert!(state.set(TransportState::Authenticating));
        assert!(state.set(TransportState::Connected));
        assert!(!state.set(TransportState::Connecting));
        assert_eq!(state.get(), TransportState::Connected);

        assert!(state.set(TransportState::Disconnecting));
        assert!(!state.set(TransportState::Ready));
        assert!(state.set(TransportState::Disconnected));
    }

    #[test]
    fn test_torn_down_session_is_not_revived() {
        let state = StateCell::new(DelegateHandle::new());
        assert!(state.set(TransportState::Authenticating));
        assert!(state.set(TransportState::Connecting));
        assert!(state.set(TransportState::Disconnecting));
        assert!(state.set(TransportState::Disconnected));

        let connecting = |s: TransportState| s == TransportState::Connecting;
        assert_eq!(
            state.transition(connecting, TransportState::Connected),
            Err(TransportState::Disconnected)
        );
        assert!(!state.set(TransportState::Connected));
        assert!(!state.set(TransportState::Ready));
        assert_eq!(state.get(), TransportState::Disconnected);
    }

    #[test]
    fn test_guarded_transition_reports_blocking_state() {
        let state = StateCell::new(DelegateHandle::new());
        let starting = |s: TransportState| {
            matches!(s, TransportState::Disconnected | TransportState::Initialized)
        };

        assert_eq!(
            state.transition(starting, TransportState::Initializing),
            Ok(TransportState::Disconnected)
        );
        assert_eq!(
            state.transition(starting, TransportState::Initializing),
            Err(TransportState::Initializing)
        );
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let state = StateCell::new(DelegateHandle::new());
        let mut rx = state.subscribe();

        state.set(TransportState::Authenticating);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), TransportState::Authenticating);
    }
}
