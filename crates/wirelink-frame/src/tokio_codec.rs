use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_message, encode_message, peek_length, DEFAULT_MAX_FRAME_SIZE};
use crate::error::{FrameError, Result};
use crate::message::Message;

/// `tokio_util` codec over the wirelink frame format.
///
/// Yields [`Message`]s with the type id already split off. Use it with
/// `Framed` when a `Stream`/`Sink` pair is more convenient than a full
/// connection with an event sink.
#[derive(Debug, Clone)]
pub struct MessageCodec {
    max_frame_size: usize,
}

impl MessageCodec {
    /// Create a codec enforcing `max_frame_size` in both directions.
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// The ceiling enforced on total frame size.
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        match decode_message(src, self.max_frame_size)? {
            Some(delivered) => Message::parse(delivered).map(Some),
            None => {
                if let Some(total) = peek_length(&src[..]) {
                    src.reserve((total as usize).saturating_sub(src.len()));
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<()> {
        if item.wire_size() > self.max_frame_size {
            return Err(FrameError::OversizedFrame {
                size: item.wire_size(),
                max: self.max_frame_size,
            });
        }
        encode_message(item.type_id, Some(item.payload.as_ref()), dst)
    }
}
