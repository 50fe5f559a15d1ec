//! Error types for connector orchestration.

use thiserror::Error;

use crate::types::ResourceKind;

/// Main error type for edcflow operations.
#[derive(Error, Debug, Clone)]
pub enum EdcError {
    /// The connector could not be reached or the request timed out.
    #[error("Transport error calling {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    /// The connector answered with a status code we do not accept.
    #[error("Unexpected status {status} from {endpoint}: {body}")]
    UnexpectedStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The response did not have the shape the API variant promises.
    #[error("Protocol error from {endpoint}: {message}")]
    Protocol { endpoint: String, message: String },

    /// A polled entity reached a configured failure state.
    #[error("{resource} {id} reached terminal failure state {state}")]
    TerminalFailure {
        resource: ResourceKind,
        id: String,
        state: String,
    },

    /// Poll budget exhausted before a terminal state was observed.
    #[error("{resource} {id} did not reach a terminal state after {attempts} attempts ({elapsed_ms}ms)")]
    Timeout {
        resource: ResourceKind,
        id: String,
        attempts: u32,
        elapsed_ms: u64,
    },

    /// Cancellation was requested while waiting on a remote entity.
    #[error("Waiting on {resource} {id} was cancelled")]
    Cancelled { resource: ResourceKind, id: String },

    /// Invalid local configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Coarse classification of an [`EdcError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Protocol,
    TerminalFailure,
    Timeout,
    Cancelled,
    Configuration,
}

impl EdcError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EdcError::Transport { .. } => ErrorKind::Transport,
            EdcError::UnexpectedStatus { .. }
            | EdcError::Protocol { .. }
            | EdcError::SerializationError(_) => ErrorKind::Protocol,
            EdcError::TerminalFailure { .. } => ErrorKind::TerminalFailure,
            EdcError::Timeout { .. } => ErrorKind::Timeout,
            EdcError::Cancelled { .. } => ErrorKind::Cancelled,
            EdcError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Returns true if retrying the same request may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EdcError::Transport { .. })
    }

    /// Shorthand for a [`EdcError::Protocol`] error.
    pub fn protocol(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        EdcError::Protocol {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }
}

/// Convenience Result type for edcflow operations.
pub type Result<T> = std::result::Result<T, EdcError>;

impl From<serde_json::Error> for EdcError {
    fn from(err: serde_json::Error) -> Self {
        EdcError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let status = EdcError::UnexpectedStatus {
            endpoint: "http://x/v2/assets".into(),
            status: 409,
            body: "conflict".into(),
        };
        assert_eq!(status.kind(), ErrorKind::Protocol);
        assert_eq!(EdcError::protocol("e", "m").kind(), ErrorKind::Protocol);

        let failure = EdcError::TerminalFailure {
            resource: ResourceKind::Negotiation,
            id: "n-1".into(),
            state: "TERMINATED".into(),
        };
        assert_eq!(failure.kind(), ErrorKind::TerminalFailure);
        assert!(failure.to_string().contains("TERMINATED"));
    }

    #[test]
    fn test_only_transport_is_recoverable() {
        let transport = EdcError::Transport {
            endpoint: "http://x".into(),
            message: "connection refused".into(),
        };
        assert!(transport.is_recoverable());
        assert!(!EdcError::Configuration("bad".into()).is_recoverable());
        assert!(!EdcError::Cancelled {
            resource: ResourceKind::TransferProcess,
            id: "t".into()
        }
        .is_recoverable());
    }

    #[test]
    fn test_from_serde_json() {
        let err: EdcError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, EdcError::SerializationError(_)));
    }
}
