use std::net::{Shutdown, SocketAddr};

use async_trait::async_trait;

use crate::error::Result;

/// A connected byte-stream endpoint.
///
/// Every method takes `&self`: one task sits in [`Transport::recv`] for the
/// lifetime of the connection while other threads send, disconnect or tear
/// the socket down. Implementations must tolerate that overlap.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Read up to `buf.len()` bytes.
    ///
    /// `Ok(0)` means the peer closed its sending side.
    async fn recv(&self, buf: &mut [u8]) -> Result<usize>;

    /// Write the whole of `buf`, returning the number of bytes written.
    async fn send(&self, buf: &[u8]) -> Result<usize>;

    /// Graceful asynchronous shutdown of the connection.
    async fn disconnect(&self) -> Result<()>;

    /// Synchronously shut down one or both directions.
    fn shutdown(&self, how: Shutdown) -> Result<()>;

    /// Hard close. Subsequent I/O fails with [`TransportError::Shutdown`].
    ///
    /// [`TransportError::Shutdown`]: crate::TransportError::Shutdown
    fn close(&self);

    /// Whether the last known state of the socket is connected.
    fn is_connected(&self) -> bool;

    /// Local socket address.
    fn local_addr(&self) -> Result<SocketAddr>;

    /// Remote socket address.
    fn peer_addr(&self) -> Result<SocketAddr>;

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str {
        "unknown"
    }
}
