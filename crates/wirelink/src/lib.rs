//! Typed length-prefixed messaging over connected TCP streams.
//!
//! wirelink frames application messages as `[u32 total length][u16 type id][payload]`
//! (little-endian), reassembles them from arbitrary read boundaries and delivers
//! them through an event-driven connection object.
//!
//! # Crate Structure
//!
//! - [`transport`]: connected byte-stream abstraction and its TCP implementation
//! - [`frame`]: frame codec, message type and reassembly buffer
//! - [`conn`]: event-driven connection with a perpetual receive loop (behind `conn` feature)

/// Re-export transport types.
pub mod transport {
    pub use wirelink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use wirelink_frame::*;
}

/// Re-export connection types (requires `conn` feature).
#[cfg(feature = "conn")]
pub mod conn {
    pub use wirelink_conn::*;
}
