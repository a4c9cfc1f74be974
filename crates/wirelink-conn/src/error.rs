use wirelink_frame::FrameError;
use wirelink_transport::TransportError;

/// Errors that can occur in connection operations.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The connection could not be constructed with the given inputs.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The connection has been disposed.
    #[error("connection disposed")]
    Disposed,

    /// The transport does not report a live connection.
    #[error("transport not connected")]
    NotConnected,

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error (oversized or malformed frame, payload serialization).
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

impl ConnectionError {
    /// True if the peer advertised a frame above the connection's ceiling.
    pub fn is_oversized_frame(&self) -> bool {
        matches!(self, ConnectionError::Frame(FrameError::OversizedFrame { .. }))
    }
}

pub type Result<T> = std::result::Result<T, ConnectionError>;
