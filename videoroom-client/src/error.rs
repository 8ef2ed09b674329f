//! Error types for the room client

use thiserror::Error;

/// Room client error types
#[derive(Debug, Error)]
pub enum RoomError {
    /// Device or permission failure while acquiring local media.
    /// Recoverable: the session returns to `Idle`.
    #[error("media acquisition failed: {0}")]
    MediaAcquisition(String),

    /// The signaling channel rejected the join request. Carries the opaque
    /// server error payload. Recoverable: the session returns to `Idle`.
    #[error("join rejected by signaling server: {0}")]
    JoinRejected(serde_json::Value),

    /// Engine-level negotiation refusal. Fatal: the session is torn down.
    #[error("connection denied: {0}")]
    ConnectionDenied(String),

    /// Signaling channel error or close. Fatal: the session is torn down.
    #[error("signaling transport lost: {0}")]
    TransportLost(String),

    /// Unexpected negotiation engine failure during a command.
    #[error("negotiation engine fault: {0}")]
    Engine(String),
}

impl RoomError {
    /// Whether the error unconditionally terminates the session.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::ConnectionDenied(_) | Self::TransportLost(_))
    }
}

/// Result type for room client operations
pub type Result<T> = std::result::Result<T, RoomError>;
