use std::fmt;

pub type Result<T> = std::result::Result<T, RelayError>;

/// Errors raised by the messaging and storage transports.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Timeout or connection failure. The poll loop retries these after a delay.
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx answer from either backend.
    #[error("remote rejected request ({status}): {message}")]
    Remote { status: u16, message: String },

    /// Payload refused because of its size.
    #[error("payload too large: {0}")]
    Oversized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl RelayError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RelayError::Network(_))
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => RelayError::Remote {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None => RelayError::Network(e.to_string()),
        }
    }
}

/// Stage at which a relay attempt gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolvingPath,
    Downloading,
    Uploading,
}

/// Cause reported to the sender and the control channel when a relay fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    LookupFailure,
    TransientNetwork,
    RemoteRejection(u16),
    Oversized,
    Unknown(String),
}

impl FailureCause {
    pub fn classify(stage: Stage, error: &RelayError) -> Self {
        match (stage, error) {
            (_, RelayError::Oversized(_)) => FailureCause::Oversized,
            (Stage::ResolvingPath, _) => FailureCause::LookupFailure,
            (_, RelayError::Network(_)) => FailureCause::TransientNetwork,
            (_, RelayError::Remote { status, .. }) => FailureCause::RemoteRejection(*status),
            (_, other) => FailureCause::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::LookupFailure => write!(f, "file lookup failed"),
            FailureCause::TransientNetwork => write!(f, "network error"),
            FailureCause::RemoteRejection(status) => write!(f, "remote rejected ({status})"),
            FailureCause::Oversized => write!(f, "file too large"),
            FailureCause::Unknown(detail) => write!(f, "unexpected error: {detail}"),
        }
    }
}
