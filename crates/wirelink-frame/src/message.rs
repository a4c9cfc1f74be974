use bytes::Bytes;

use crate::codec::{HEADER_SIZE, TYPE_ID_SIZE};
use crate::error::{FrameError, Result};

/// A typed message with its type id split from the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Application-defined message type.
    pub type_id: u16,
    /// The message payload.
    pub payload: Bytes,
}

impl Message {
    /// Create a new message.
    pub fn new(type_id: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            type_id,
            payload: payload.into(),
        }
    }

    /// Split a delivered message (`type_id || payload`) into its parts.
    ///
    /// The payload shares the delivered buffer; nothing is copied.
    pub fn parse(delivered: Bytes) -> Result<Self> {
        let type_id = type_id_of(&delivered).ok_or(FrameError::TruncatedMessage {
            len: delivered.len(),
        })?;
        Ok(Self {
            type_id,
            payload: delivered.slice(TYPE_ID_SIZE..),
        })
    }

    /// The total wire size of this message once framed.
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Read the type id at the front of a delivered message.
pub fn type_id_of(delivered: &[u8]) -> Option<u16> {
    let raw: [u8; TYPE_ID_SIZE] = delivered.get(..TYPE_ID_SIZE)?.try_into().ok()?;
    Some(u16::from_le_bytes(raw))
}
