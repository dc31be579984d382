use thiserror::Error;

/// Wire-level failure taxonomy. `is_transient` decides whether the sync
/// layer may retry; mutations never retry regardless.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server error (http {status}): {message}")]
    Server { status: u16, message: String },
    #[error("request rejected (http {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("invalid response payload: {0}")]
    InvalidPayload(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl ApiError {
    /// Timeouts, connection failures, and 5xx responses are worth retrying;
    /// everything else fails on first occurrence.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { .. })
    }
}
