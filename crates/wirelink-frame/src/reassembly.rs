use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::codec::decode_message;
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Accumulates received chunks and slices complete messages off the front.
///
/// Bytes are appended at the write cursor by [`push`](Self::push) and drained
/// one message at a time by [`next_message`](Self::next_message). Consumed
/// prefixes are dropped in place; the backing allocation is reused rather
/// than regrown for every chunk.
///
/// Usage is push-then-drain:
///
/// ```
/// use wirelink_frame::{encode, ReassemblyBuffer};
///
/// let frame = encode(7, Some(b"hi")).unwrap();
/// let mut buffer = ReassemblyBuffer::new(1024);
///
/// buffer.push(&frame[..3]);
/// assert!(buffer.next_message().unwrap().is_none());
///
/// buffer.push(&frame[3..]);
/// let message = buffer.next_message().unwrap().unwrap();
/// assert_eq!(message.as_ref(), &[0x07, 0x00, b'h', b'i']);
/// ```
#[derive(Debug)]
pub struct ReassemblyBuffer {
    buf: BytesMut,
    max_frame_size: usize,
}

impl ReassemblyBuffer {
    /// Create a buffer enforcing `max_frame_size` (header + payload).
    pub fn new(max_frame_size: usize) -> Self {
        Self::with_capacity(INITIAL_BUFFER_CAPACITY.min(max_frame_size), max_frame_size)
    }

    /// Create a buffer with an explicit initial capacity.
    pub fn with_capacity(capacity: usize, max_frame_size: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            max_frame_size,
        }
    }

    /// Append a received chunk at the write cursor.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Slice the next complete message (`type_id || payload`) off the front.
    ///
    /// Returns `Ok(None)` when more bytes are needed. Fails with
    /// [`FrameError::OversizedFrame`] as soon as an advertised length above the
    /// ceiling is readable, without waiting for the rest of that frame.
    pub fn next_message(&mut self) -> Result<Option<Bytes>> {
        match decode_message(&mut self.buf, self.max_frame_size) {
            Err(err @ FrameError::OversizedFrame { .. }) => {
                debug!(error = %err, buffered = self.buf.len(), "rejecting frame");
                Err(err)
            }
            other => other,
        }
    }

    /// Drain every complete message currently buffered, in arrival order.
    ///
    /// Messages extracted before an error are still returned through
    /// `deliver`; the error ends the drain.
    pub fn drain_with<F>(&mut self, mut deliver: F) -> Result<usize>
    where
        F: FnMut(Bytes),
    {
        let mut delivered = 0usize;
        while let Some(message) = self.next_message()? {
            deliver(message);
            delivered += 1;
        }
        Ok(delivered)
    }

    /// Number of bytes received but not yet delivered.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when no undelivered bytes are held.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Discard all undelivered bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// The ceiling enforced on total frame size.
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}
