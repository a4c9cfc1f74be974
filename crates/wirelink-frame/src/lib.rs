//! Length-prefixed typed-message framing and stream reassembly.
//!
//! Every message on the wire is framed as:
//! - a 4-byte little-endian total length (covers the whole frame, itself included)
//! - a 2-byte little-endian type id
//! - the payload
//!
//! The [`ReassemblyBuffer`] turns arbitrary read chunks back into complete
//! messages. Delivered messages keep the type id attached (`type_id || payload`);
//! [`Message::parse`] splits it off for consumers that want it separated.

pub mod codec;
pub mod error;
pub mod message;
pub mod reassembly;
#[cfg(feature = "async")]
pub mod tokio_codec;

pub use codec::{
    decode_message, encode, encode_message, encode_serialized, peek_length,
    DEFAULT_MAX_FRAME_SIZE, HEADER_SIZE, LENGTH_PREFIX_SIZE, TYPE_ID_SIZE,
};
pub use error::{FrameError, Result};
pub use message::{type_id_of, Message};
pub use reassembly::ReassemblyBuffer;
#[cfg(feature = "async")]
pub use tokio_codec::MessageCodec;
