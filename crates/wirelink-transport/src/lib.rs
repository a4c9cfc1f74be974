//! Connected byte-stream transport abstraction.
//!
//! This is the lowest layer of wirelink. A [`Transport`] is an already-connected
//! socket exposing asynchronous send/receive/disconnect and synchronous
//! shutdown/close. Everything above it only ever talks to the trait.
//!
//! - [`TcpTransport`] / [`TcpEndpoint`]: the TCP implementation
//! - [`probe`]: small socket utilities (port availability, local address)

pub mod error;
pub mod probe;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use probe::{is_port_available, local_address, AddressFamily};
pub use tcp::{TcpEndpoint, TcpTransport};
pub use traits::Transport;
