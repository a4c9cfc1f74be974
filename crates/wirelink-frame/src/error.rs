/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The advertised frame length exceeds the configured maximum.
    #[error("frame too large ({size} bytes, max {max})")]
    OversizedFrame { size: usize, max: usize },

    /// The advertised frame length cannot even hold the header.
    #[error("malformed frame: length {length} is below the 6-byte header")]
    MalformedFrame { length: usize },

    /// A delivered message is too short to carry a type id.
    #[error("message too short for a type id ({len} bytes, need 2)")]
    TruncatedMessage { len: usize },

    /// The payload serializer failed.
    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
