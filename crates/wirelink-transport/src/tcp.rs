use std::io::ErrorKind;
use std::net::{Shutdown, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use socket2::SockRef;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// TCP implementation of [`Transport`].
///
/// Reads and writes go through readiness plus `try_read`/`try_write`, which
/// only need `&TcpStream`, so a pending receive never blocks a send.
pub struct TcpTransport {
    stream: TcpStream,
    connected: AtomicBool,
    closed: AtomicBool,
}

impl TcpTransport {
    /// Wrap an already-connected stream.
    pub fn from_stream(stream: TcpStream) -> Self {
        Self {
            stream,
            connected: AtomicBool::new(true),
            closed: AtomicBool::new(false),
        }
    }

    fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Shutdown);
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        loop {
            self.ensure_open()?;
            self.stream.readable().await?;
            match self.stream.try_read(buf) {
                Ok(0) => {
                    self.mark_disconnected();
                    return Ok(0);
                }
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.mark_disconnected();
                    return Err(TransportError::Io(err));
                }
            }
        }
    }

    async fn send(&self, buf: &[u8]) -> Result<usize> {
        let mut offset = 0usize;
        while offset < buf.len() {
            self.ensure_open()?;
            self.stream.writable().await?;
            match self.stream.try_write(&buf[offset..]) {
                Ok(0) => {
                    self.mark_disconnected();
                    return Err(TransportError::Io(std::io::Error::from(
                        ErrorKind::WriteZero,
                    )));
                }
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.mark_disconnected();
                    return Err(TransportError::Io(err));
                }
            }
        }
        Ok(offset)
    }

    async fn disconnect(&self) -> Result<()> {
        self.ensure_open()?;
        // Wait until the socket can take more data so earlier writes are not cut short.
        self.stream.writable().await?;
        self.shutdown(Shutdown::Both)
    }

    fn shutdown(&self, how: Shutdown) -> Result<()> {
        if matches!(how, Shutdown::Write | Shutdown::Both) {
            self.mark_disconnected();
        }
        SockRef::from(&self.stream).shutdown(how)?;
        debug!(?how, "tcp transport shut down");
        Ok(())
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.mark_disconnected();
        // The peer may already be gone; the descriptor itself is released on drop.
        let _ = SockRef::from(&self.stream).shutdown(Shutdown::Both);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire) && !self.closed.load(Ordering::Acquire)
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        self.stream.local_addr().map_err(Into::into)
    }

    fn peer_addr(&self) -> Result<SocketAddr> {
        self.stream.peer_addr().map_err(Into::into)
    }

    fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("peer", &self.stream.peer_addr().ok())
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Listening TCP endpoint producing connected [`TcpTransport`]s.
pub struct TcpEndpoint {
    listener: TcpListener,
}

impl TcpEndpoint {
    /// Bind and listen on `addr`.
    pub async fn bind(addr: impl ToSocketAddrs + std::fmt::Display) -> Result<Self> {
        let desc = addr.to_string();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::Bind {
                addr: desc,
                source: e,
            })?;
        info!(addr = ?listener.local_addr().ok(), "listening on tcp");
        Ok(Self { listener })
    }

    /// Accept an incoming connection.
    pub async fn accept(&self) -> Result<TcpTransport> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::Accept)?;
        stream.set_nodelay(true)?;
        debug!(%peer, "accepted connection");
        Ok(TcpTransport::from_stream(stream))
    }

    /// Connect to a listening endpoint.
    pub async fn connect(addr: impl ToSocketAddrs + std::fmt::Display) -> Result<TcpTransport> {
        let desc = addr.to_string();
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::Connect {
                addr: desc.clone(),
                source: e,
            })?;
        stream.set_nodelay(true)?;
        debug!(addr = %desc, "connected over tcp");
        Ok(TcpTransport::from_stream(stream))
    }

    /// The bound local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(Into::into)
    }
}
