use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::error::{FrameError, Result};

/// Size of the total-length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Size of the type id that follows the length prefix.
pub const TYPE_ID_SIZE: usize = 2;

/// Frame header: length (4) + type id (2) = 6 bytes.
pub const HEADER_SIZE: usize = LENGTH_PREFIX_SIZE + TYPE_ID_SIZE;

/// Default maximum total frame size: 16 MiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

const MAX_WIRE_LENGTH: usize = u32::MAX as usize;

/// Encode a typed message into the wire format.
///
/// Wire format (all integers little-endian):
/// ```text
/// ┌──────────────────┬───────────┬──────────────────────────┐
/// │ Total length     │ Type id   │ Payload                  │
/// │ (4B LE, incl.    │ (2B LE)   │ (total length - 6 bytes) │
/// │  the whole frame)│           │                          │
/// └──────────────────┴───────────┴──────────────────────────┘
/// ```
///
/// A `None` payload encodes the same as an empty one.
pub fn encode_message(type_id: u16, payload: Option<&[u8]>, dst: &mut BytesMut) -> Result<()> {
    let payload = payload.unwrap_or_default();
    let total = HEADER_SIZE + payload.len();
    if total > MAX_WIRE_LENGTH {
        return Err(FrameError::OversizedFrame {
            size: total,
            max: MAX_WIRE_LENGTH,
        });
    }
    dst.reserve(total);
    dst.put_u32_le(total as u32);
    dst.put_u16_le(type_id);
    dst.put_slice(payload);
    Ok(())
}

/// Encode a typed message into a fresh buffer.
pub fn encode(type_id: u16, payload: Option<&[u8]>) -> Result<Bytes> {
    let mut dst = BytesMut::new();
    encode_message(type_id, payload, &mut dst)?;
    Ok(dst.freeze())
}

/// Encode a serializable value as the payload of a typed message.
///
/// The payload length is unknown until serialization finishes, so the header
/// is reserved up front and the length field patched afterwards. On failure
/// `dst` is left exactly as it was.
pub fn encode_serialized<T>(type_id: u16, value: &T, dst: &mut BytesMut) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let start = dst.len();
    dst.reserve(HEADER_SIZE);
    dst.put_u32_le(0);
    dst.put_u16_le(type_id);

    if let Err(err) = serde_json::to_writer((&mut *dst).writer(), value) {
        dst.truncate(start);
        return Err(FrameError::Serialize(err));
    }

    let total = dst.len() - start;
    if total > MAX_WIRE_LENGTH {
        dst.truncate(start);
        return Err(FrameError::OversizedFrame {
            size: total,
            max: MAX_WIRE_LENGTH,
        });
    }
    dst[start..start + LENGTH_PREFIX_SIZE].copy_from_slice(&(total as u32).to_le_bytes());
    Ok(())
}

/// Read the total-length prefix, or `None` if fewer than 4 bytes are present.
pub fn peek_length(buf: &[u8]) -> Option<u32> {
    let prefix: [u8; LENGTH_PREFIX_SIZE] = buf.get(..LENGTH_PREFIX_SIZE)?.try_into().ok()?;
    Some(u32::from_le_bytes(prefix))
}

/// Extract one complete message (`type_id || payload`) from the front of `src`.
///
/// Returns `Ok(None)` if `src` doesn't hold a complete frame yet. The size
/// check happens as soon as the length prefix is readable, before the rest of
/// the frame arrives; on error nothing is consumed.
pub fn decode_message(src: &mut BytesMut, max_frame_size: usize) -> Result<Option<Bytes>> {
    let Some(total) = peek_length(&src[..]) else {
        return Ok(None); // Need more data
    };
    let total = total as usize;

    if total > max_frame_size {
        return Err(FrameError::OversizedFrame {
            size: total,
            max: max_frame_size,
        });
    }
    if total < HEADER_SIZE {
        return Err(FrameError::MalformedFrame { length: total });
    }
    if src.len() < total {
        return Ok(None); // Need more data
    }

    // Copy out rather than split: `src` keeps sole ownership of its allocation,
    // so the next reserve can shift the leftover bytes to the front in place.
    let message = Bytes::copy_from_slice(&src[LENGTH_PREFIX_SIZE..total]);
    src.advance(total);
    Ok(Some(message))
}
