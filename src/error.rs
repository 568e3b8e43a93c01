use std::error::Error as StdError;

pub type BoxError = Box<dyn StdError + Send + Sync>;

pub type Result<T> = std::result::Result<T, RtviError>;

/// Errors surfaced by the RTVI client.
///
/// Variants that wrap another error expose it through [`StdError::source`], so the
/// full chain down to the root cause can be walked with [`RtviError::root_cause`].
#[derive(Debug, thiserror::Error)]
pub enum RtviError {
    #[error("Invalid or malformed auth bundle provided to Transport.")]
    InvalidAuthBundle {
        #[source]
        source: Option<BoxError>,
    },

    /// The authentication handshake or an HTTP fallback request failed.
    #[error("{message}")]
    Http {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Failed to connect / invalid auth bundle from base url")]
    StartFailed {
        #[source]
        source: Box<RtviError>,
    },

    #[error("Unable to update configuration.")]
    ConfigUpdateFailed {
        #[source]
        source: Box<RtviError>,
    },

    #[error("Bot is not ready yet.")]
    BotNotReady,

    #[error("{message}")]
    BotResponse { message: String },

    #[error("The operation timed out before it could complete.")]
    ResponseTimeout,

    #[error("Received an error response when trying to execute the function {function}.")]
    AsyncExecutionFailed {
        function: String,
        #[source]
        source: Box<RtviError>,
    },

    #[error("Helper with name '{service}' already registered")]
    HelperAlreadyRegistered { service: String },

    #[error("Helper with name '{service}' not registered")]
    HelperNotRegistered { service: String },

    #[error("Helper registered for service '{service}' is not of expected type")]
    HelperTypeMismatch { service: String },

    #[error("Transport is not connected and no HTTP fallback is configured")]
    FallbackNotSupported,

    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Invalid client configuration: {0}")]
    Config(#[from] crate::client::ConfigError),

    #[error("Failed to encode or decode a message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{message}")]
    Other {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl RtviError {
    pub fn http(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        RtviError::Http {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        RtviError::Transport {
            message: message.into(),
            source: None,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        RtviError::Other {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn start_failed(source: RtviError) -> Self {
        RtviError::StartFailed {
            source: Box::new(source),
        }
    }

    pub(crate) fn async_execution(function: &str, source: RtviError) -> Self {
        RtviError::AsyncExecutionFailed {
            function: function.to_string(),
            source: Box::new(source),
        }
    }

    /// The innermost error of the chain; `self` when nothing is wrapped.
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        let mut current: &(dyn StdError + 'static) = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }

    /// The message of this error followed by the message of its root cause.
    pub fn detailed_message(&self) -> String {
        if self.source().is_none() {
            return self.to_string();
        }
        format!("{} {}", self, self.root_cause())
    }
}

impl From<rtvi_client_types::ValueError> for RtviError {
    fn from(error: rtvi_client_types::ValueError) -> Self {
        RtviError::Other {
            message: format!("Failed to build message value: {}", error),
            source: Some(Box::new(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_cause_walks_the_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let error = RtviError::start_failed(RtviError::http("Failed while authenticating.", io));

        assert_eq!(error.root_cause().to_string(), "connection refused");
        assert_eq!(
            error.detailed_message(),
            "Failed to connect / invalid auth bundle from base url connection refused"
        );
    }

    #[test]
    fn test_detailed_message_without_cause() {
        assert_eq!(RtviError::BotNotReady.detailed_message(), "Bot is not ready yet.");
    }
}
