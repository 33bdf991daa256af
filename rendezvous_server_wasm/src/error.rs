//! Error types for the rendezvous relay

use thiserror::Error;

/// Errors reported to the caller of a signaling request.
///
/// Every variant is detected before any room is touched, except
/// [`SignalingError::QueueFull`] and [`SignalingError::Storage`], which are
/// raised while the operation is applied. Neither leaves a partial effect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignalingError {
    /// Request arrived via a method that cannot carry a signaling request
    #[error("Method not allowed")]
    UnsupportedTransportMethod,

    /// `roomCode` or `role` was absent or empty
    #[error("roomCode and role are required")]
    MissingRequiredField,

    /// `role` was present but not `host` or `guest`
    #[error("role must be 'host' or 'guest'")]
    InvalidRole,

    /// `send` without a payload
    #[error("payload is required for send")]
    MissingPayload,

    /// `action` was not one of join, send, recv or leave
    #[error("Unknown action")]
    UnknownAction,

    /// Body could not be decoded as a signaling request
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// Recipient queue is at capacity and the overflow policy rejects sends
    #[error("Message queue is full")]
    QueueFull,

    /// Shared state file could not be read or written; the operation was not applied
    #[error("State storage failed: {0}")]
    Storage(String),
}

impl SignalingError {
    /// HTTP status code the error is surfaced with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UnsupportedTransportMethod => 405,
            Self::QueueFull => 429,
            Self::Storage(_) => 500,
            Self::MissingRequiredField
            | Self::InvalidRole
            | Self::MissingPayload
            | Self::UnknownAction
            | Self::InvalidBody(_) => 400,
        }
    }
}

impl From<serde_json::Error> for SignalingError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidBody(err.to_string())
    }
}

/// Errors from loading [`crate::ServerConfig`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Queue capacity was not a positive integer
    #[error("invalid queue capacity {0:?}: expected a positive integer")]
    InvalidCapacity(String),

    /// Unrecognized overflow policy
    #[error("invalid overflow policy {0:?}: expected 'drop-oldest' or 'reject'")]
    InvalidOverflowPolicy(String),

    /// Unrecognized ready mode
    #[error("invalid ready mode {0:?}: expected 'every-join' or 'transition'")]
    InvalidReadyMode(String),
}
