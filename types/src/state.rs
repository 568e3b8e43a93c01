use std::fmt;

/// The current state of the session transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    Disconnected,
    Initializing,
    Initialized,
    Authenticating,
    Connecting,
    Connected,
    Ready,
    Disconnecting,
    Error,
}

impl TransportState {
    /// Position on the happy path, `None` for the teardown and failure states.
    fn rank(self) -> Option<u8> {
        match self {
            TransportState::Disconnected => Some(0),
            TransportState::Initializing => Some(1),
            TransportState::Initialized => Some(2),
            TransportState::Authenticating => Some(3),
            TransportState::Connecting => Some(4),
            TransportState::Connected => Some(5),
            TransportState::Ready => Some(6),
            TransportState::Disconnecting | TransportState::Error => None,
        }
    }

    /// Whether moving from `self` to `next` respects the session lifecycle.
    ///
    /// `disconnecting` and `error` are reachable from anywhere, `disconnected`
    /// closes any session. A new session leaves `disconnected` only through
    /// `initializing` or `authenticating`. Every other state must lie
    /// strictly ahead on the happy path.
    pub fn can_transition_to(self, next: TransportState) -> bool {
        if self == next {
            return true;
        }
        match next {
            TransportState::Disconnecting | TransportState::Error | TransportState::Disconnected => {
                true
            }
            _ if self == TransportState::Disconnected => matches!(
                next,
                TransportState::Initializing | TransportState::Authenticating
            ),
            _ => match (self.rank(), next.rank()) {
                (Some(current), Some(next)) => next > current,
                _ => false,
            },
        }
    }

    /// True for the states in which a transport connection may exist.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            TransportState::Connecting | TransportState::Connected | TransportState::Ready
        )
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = match self {
            TransportState::Disconnected => "Disconnected",
            TransportState::Initializing => "Initializing",
            TransportState::Initialized => "Initialized",
            TransportState::Authenticating => "Handshaking",
            TransportState::Connecting => "Connecting",
            TransportState::Connected => "Connected",
            TransportState::Ready => "Ready",
            TransportState::Disconnecting => "Disconnecting",
            TransportState::Error => "Error",
        };
        f.write_str(description)
    }
}

#[cfg(test)]
mod tests {
    use super::TransportState::*;

    #[test]
    fn test_happy_path_moves_forward_only() {
        assert!(Disconnected.can_transition_to(Authenticating));
        assert!(Connecting.can_transition_to(Ready));
        assert!(!Ready.can_transition_to(Connected));
        assert!(!Authenticating.can_transition_to(Initialized));
    }

    #[test]
    fn test_teardown_reachable_from_anywhere() {
        for state in [Initialized, Connected, Ready, Error] {
            assert!(state.can_transition_to(Disconnecting));
            assert!(state.can_transition_to(Error));
            assert!(state.can_transition_to(Disconnected));
        }
        assert!(!Error.can_transition_to(Connecting));
        assert!(!Disconnecting.can_transition_to(Ready));
    }

    #[test]
    fn test_session_restarts_only_from_its_first_steps() {
        assert!(Disconnected.can_transition_to(Initializing));
        assert!(Disconnected.can_transition_to(Authenticating));
        for state in [Initialized, Connecting, Connected, Ready] {
            assert!(!Disconnected.can_transition_to(state), "{}", state);
        }
    }
}
