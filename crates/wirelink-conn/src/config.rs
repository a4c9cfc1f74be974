use wirelink_frame::DEFAULT_MAX_FRAME_SIZE;

use crate::error::{ConnectionError, Result};

/// Default size of the per-read scratch buffer.
pub const DEFAULT_RECEIVE_BUFFER_SIZE: usize = 4096;

/// Per-connection configuration, fixed at construction.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Ceiling on total frame size (header + payload). Default: 16 MiB.
    pub max_frame_size: usize,
    /// Size of the buffer each individual read lands in. Default: 4 KiB.
    pub receive_buffer_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            receive_buffer_size: DEFAULT_RECEIVE_BUFFER_SIZE,
        }
    }
}

impl ConnectionConfig {
    /// Default configuration with an explicit frame ceiling.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_frame_size == 0 {
            return Err(ConnectionError::InvalidConfiguration(
                "max_frame_size must be positive".to_string(),
            ));
        }
        if self.receive_buffer_size == 0 {
            return Err(ConnectionError::InvalidConfiguration(
                "receive_buffer_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
