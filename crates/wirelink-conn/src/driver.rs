//! Per-connection driver tasks.
//!
//! Two tasks run for every open connection:
//! - the receive loop, which keeps exactly one read outstanding and owns the
//!   scratch buffer and the reassembly buffer, so neither needs a lock;
//! - the writer, which drains the outbound queue one frame at a time.
//!
//! Every completion re-checks the disposed flag first. An operation that
//! finishes after `dispose` is dropped without notification.

use std::sync::{Arc, Weak};

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{trace, warn};
use wirelink_frame::ReassemblyBuffer;
use wirelink_transport::Transport;

use crate::connection::{Connection, Shared};
use crate::error::ConnectionError;

/// Work queued for the writer task.
#[derive(Debug)]
pub(crate) enum Outbound {
    /// An encoded frame.
    Frame(Bytes),
    /// Shut the transport down once everything queued before it is written.
    Disconnect,
}

pub(crate) async fn receive_loop(conn: Connection, transport: Arc<dyn Transport>) {
    let mut scratch = vec![0u8; conn.shared.config.receive_buffer_size];
    let mut reassembly = ReassemblyBuffer::new(conn.shared.config.max_frame_size);

    loop {
        let result = transport.recv(&mut scratch).await;
        if conn.is_disposed() {
            trace!("receive completed after dispose");
            return;
        }

        let read = match result {
            Ok(0) => {
                if conn.shared.state.is_active() {
                    conn.shared.state.mark_disconnected();
                    conn.report_disconnected(None);
                }
                return;
            }
            Ok(n) => n,
            Err(err) => {
                if !conn.shared.state.is_active() {
                    trace!(error = %err, "receive ended by local disconnect");
                    return;
                }
                conn.shared.state.stop_receiving();
                if !conn.classify(&err) {
                    warn!(error = %err, "receive failed");
                    conn.shared
                        .sink
                        .on_message_received(&conn, Err(ConnectionError::Transport(err)));
                }
                return;
            }
        };

        trace!(bytes = read, "fragment received");
        conn.shared.sink.on_fragment_received(&conn);

        reassembly.push(&scratch[..read]);
        let drained = reassembly.drain_with(|message| {
            if !conn.is_disposed() {
                conn.shared.sink.on_message_received(&conn, Ok(message));
            }
        });
        if let Err(err) = drained {
            // The stream cannot be resynchronized after a bad length prefix.
            reassembly.clear();
            conn.shared.state.stop_receiving();
            if !conn.is_disposed() {
                warn!(error = %err, "inbound frame rejected");
                conn.shared
                    .sink
                    .on_message_received(&conn, Err(ConnectionError::Frame(err)));
            }
            return;
        }

        if conn.is_disposed() {
            return;
        }
        if !conn.shared.state.is_active() {
            trace!("not re-arming receive after disconnect");
            return;
        }
    }
}

pub(crate) async fn write_loop(
    shared: Weak<Shared>,
    transport: Arc<dyn Transport>,
    mut queue: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(item) = queue.recv().await {
        match item {
            Outbound::Frame(frame) => {
                let result = transport.send(&frame).await;
                let Some(conn) = upgrade(&shared) else {
                    return;
                };
                if conn.is_disposed() {
                    trace!("send completed after dispose");
                    return;
                }
                match result {
                    Ok(written) => {
                        trace!(bytes = written, "frame sent");
                        conn.shared.sink.on_send_completed(&conn, Ok(written));
                    }
                    Err(err) => {
                        if !conn.classify(&err) {
                            warn!(error = %err, "send failed");
                            conn.shared
                                .sink
                                .on_send_completed(&conn, Err(ConnectionError::Transport(err)));
                        }
                    }
                }
            }
            Outbound::Disconnect => {
                let result = transport.disconnect().await;
                let Some(conn) = upgrade(&shared) else {
                    return;
                };
                if conn.is_disposed() {
                    trace!("disconnect completed after dispose");
                    return;
                }
                conn.shared.state.mark_disconnected();
                match result {
                    Ok(()) => conn.report_disconnected(None),
                    Err(err) => {
                        if !conn.classify(&err) {
                            conn.report_disconnected(Some(ConnectionError::Transport(err)));
                        }
                    }
                }
                // Nothing may be written after a disconnect.
                return;
            }
        }
    }
}

fn upgrade(shared: &Weak<Shared>) -> Option<Connection> {
    shared.upgrade().map(|shared| Connection { shared })
}
