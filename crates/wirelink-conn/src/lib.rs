//! Event-driven typed-message connections.
//!
//! A [`Connection`] wraps one connected [`Transport`], keeps a receive
//! outstanding at all times, reassembles length-prefixed frames out of the
//! byte stream and hands each complete message to an [`EventSink`]. Sends are
//! queued and written in order by a per-connection writer task.
//!
//! ```no_run
//! use wirelink_conn::{ChannelSink, Connection, ConnectionConfig, ConnectionEvent};
//! use wirelink_transport::TcpEndpoint;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = TcpEndpoint::connect("127.0.0.1:9000").await?;
//! let (sink, mut events) = ChannelSink::new();
//! let conn = Connection::open(transport, sink, ConnectionConfig::default())?;
//!
//! conn.send_message(1, Some(b"hello"))?;
//! while let Some((_, event)) = events.recv().await {
//!     if let ConnectionEvent::MessageReceived(Ok(message)) = event {
//!         println!("{} bytes", message.len());
//!         break;
//!     }
//! }
//! conn.dispose();
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod driver;
mod error;
mod sink;
mod state;

pub use config::{ConnectionConfig, DEFAULT_RECEIVE_BUFFER_SIZE};
pub use connection::Connection;
pub use error::{ConnectionError, Result};
pub use sink::{ChannelSink, ConnectionEvent, EventSink};
pub use state::ConnectionState;

pub use wirelink_transport::{Transport, TransportError};
