use thiserror::Error;

/// Errors raised by the driver's public operations.
///
/// Every variant is scoped to the call that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// The caller supplied a missing, unknown, or malformed parameter.
    #[error("{0}")]
    InvalidArgument(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// The driver failed on its own side, e.g. while encoding a reply.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DriverError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("median window must hold at least 3 samples, got {0}")]
    WindowTooSmall(usize),
}

impl From<FilterError> for DriverError {
    fn from(e: FilterError) -> Self {
        Self::InvalidConfiguration(e.to_string())
    }
}

/// A single delivery of a notification failed.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("listener unreachable: {0}")]
    Unreachable(String),
    #[error("notification channel closed")]
    Closed,
    #[error("failed to encode notification: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failure to decode a driver payload received over the wire.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("{0} not present")]
    MissingParameter(&'static str),
    #[error("not a change notification from this driver")]
    UnexpectedEvent,
    #[error("sensor id must not be empty")]
    BlankSensorId,
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
}
