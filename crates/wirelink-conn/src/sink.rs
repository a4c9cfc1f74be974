use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use wirelink_transport::TransportError;

use crate::connection::Connection;
use crate::error::{ConnectionError, Result};

/// Consumer-supplied notifications for one or more connections.
///
/// Callbacks run on the connection's driver tasks. They must not block for
/// long: while `on_message_received` runs, no further reads are issued for
/// that connection.
///
/// Delivered messages are the raw `type_id || payload` bytes; use
/// [`wirelink_frame::Message::parse`] to split them.
pub trait EventSink: Send + Sync {
    /// A complete message arrived, or receiving failed.
    ///
    /// Errors here (oversized frame, unclassified transport failure) end the
    /// receive loop; most consumers dispose the connection in response.
    fn on_message_received(&self, conn: &Connection, message: Result<Bytes>);

    /// A queued frame was written, or writing it failed.
    fn on_send_completed(&self, conn: &Connection, result: Result<usize>);

    /// Some bytes arrived. Fires once per read, before any message they complete.
    fn on_fragment_received(&self, _conn: &Connection) {}

    /// The connection ended: the peer closed, a graceful disconnect completed,
    /// or `dispose` tore down a live transport. Fires at most once.
    fn on_disconnected(&self, _conn: &Connection, _error: Option<ConnectionError>) {}

    /// Return true if `error` has been dealt with and must not be surfaced.
    fn classify_transport_error(&self, _conn: &Connection, _error: &TransportError) -> bool {
        false
    }
}

/// A single notification forwarded by [`ChannelSink`].
#[derive(Debug)]
pub enum ConnectionEvent {
    MessageReceived(Result<Bytes>),
    SendCompleted(Result<usize>),
    FragmentReceived,
    Disconnected(Option<ConnectionError>),
}

/// [`EventSink`] that forwards every notification, with the connection it
/// concerns, into an unbounded channel.
///
/// Handy for async consumers that prefer awaiting events over implementing
/// callbacks. Transport errors are never classified as handled.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<(Connection, ConnectionEvent)>,
    fragments: bool,
}

impl ChannelSink {
    /// Create a sink and the receiver its events arrive on.
    ///
    /// Fragment notifications are not forwarded unless enabled with
    /// [`ChannelSink::with_fragments`].
    pub fn new() -> (
        Arc<Self>,
        mpsc::UnboundedReceiver<(Connection, ConnectionEvent)>,
    ) {
        Self::build(false)
    }

    /// Like [`ChannelSink::new`], but also forwards fragment notifications.
    pub fn with_fragments() -> (
        Arc<Self>,
        mpsc::UnboundedReceiver<(Connection, ConnectionEvent)>,
    ) {
        Self::build(true)
    }

    fn build(
        fragments: bool,
    ) -> (
        Arc<Self>,
        mpsc::UnboundedReceiver<(Connection, ConnectionEvent)>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx, fragments }), rx)
    }

    fn forward(&self, conn: &Connection, event: ConnectionEvent) {
        // A dropped receiver just means nobody is listening anymore.
        let _ = self.tx.send((conn.clone(), event));
    }
}

impl EventSink for ChannelSink {
    fn on_message_received(&self, conn: &Connection, message: Result<Bytes>) {
        self.forward(conn, ConnectionEvent::MessageReceived(message));
    }

    fn on_send_completed(&self, conn: &Connection, result: Result<usize>) {
        self.forward(conn, ConnectionEvent::SendCompleted(result));
    }

    fn on_fragment_received(&self, conn: &Connection) {
        if self.fragments {
            self.forward(conn, ConnectionEvent::FragmentReceived);
        }
    }

    fn on_disconnected(&self, conn: &Connection, error: Option<ConnectionError>) {
        self.forward(conn, ConnectionEvent::Disconnected(error));
    }
}
