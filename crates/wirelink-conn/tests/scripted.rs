//! Connection behavior against an in-memory transport with scripted reads.

use std::collections::VecDeque;
use std::io;
use std::net::{Shutdown, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Notify;
use wirelink_conn::{
    Connection, ConnectionConfig, ConnectionError, ConnectionState, EventSink, Transport,
    TransportError,
};
use wirelink_frame::encode;

type Read = Result<Vec<u8>, io::ErrorKind>;

#[derive(Debug, Default)]
struct ScriptedTransport {
    reads: Mutex<VecDeque<Read>>,
    more_reads: Notify,
    written: Mutex<Vec<u8>>,
    send_gate: Option<Arc<Notify>>,
    fail_send: bool,
    fail_disconnect: bool,
    dispose_on_send: Mutex<Option<Connection>>,
    connected: AtomicBool,
    closes: AtomicUsize,
}

impl ScriptedTransport {
    fn new(reads: Vec<Read>) -> Self {
        Self {
            reads: Mutex::new(reads.into()),
            connected: AtomicBool::new(true),
            ..Self::default()
        }
    }

    fn push_read(&self, read: Read) {
        self.reads.lock().unwrap().push_back(read);
        self.more_reads.notify_one();
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn recv(&self, buf: &mut [u8]) -> wirelink_transport::Result<usize> {
        loop {
            let next = self.reads.lock().unwrap().pop_front();
            match next {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    return Ok(bytes.len());
                }
                Some(Err(kind)) => return Err(TransportError::Io(io::Error::from(kind))),
                None => self.more_reads.notified().await,
            }
        }
    }

    async fn send(&self, buf: &[u8]) -> wirelink_transport::Result<usize> {
        if let Some(gate) = &self.send_gate {
            gate.notified().await;
        }
        if self.fail_send {
            return Err(TransportError::Io(io::Error::from(io::ErrorKind::BrokenPipe)));
        }
        self.written.lock().unwrap().extend_from_slice(buf);
        // Dispose lands after the write but before the completion is handled.
        let pending = self.dispose_on_send.lock().unwrap().take();
        if let Some(conn) = pending {
            conn.dispose();
        }
        Ok(buf.len())
    }

    async fn disconnect(&self) -> wirelink_transport::Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        if self.fail_disconnect {
            return Err(TransportError::Io(io::Error::from(io::ErrorKind::BrokenPipe)));
        }
        Ok(())
    }

    fn shutdown(&self, _how: Shutdown) -> wirelink_transport::Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn local_addr(&self) -> wirelink_transport::Result<SocketAddr> {
        Ok(SocketAddr::from(([127, 0, 0, 1], 1000)))
    }

    fn peer_addr(&self) -> wirelink_transport::Result<SocketAddr> {
        Ok(SocketAddr::from(([127, 0, 0, 1], 2000)))
    }
}

#[derive(Debug, PartialEq)]
enum Seen {
    Message(Vec<u8>),
    ReceiveError(String),
    Sent(usize),
    SendError(String),
    Fragment,
    Disconnected(Option<String>),
    Classified(io::ErrorKind),
}

#[derive(Default)]
struct RecordingSink {
    seen: Mutex<Vec<Seen>>,
    handle_errors: bool,
    dispose_on_message: bool,
    changed: Notify,
}

impl RecordingSink {
    fn handling_errors() -> Self {
        Self {
            handle_errors: true,
            ..Self::default()
        }
    }

    fn record(&self, seen: Seen) {
        self.seen.lock().unwrap().push(seen);
        self.changed.notify_waiters();
    }

    fn snapshot(&self) -> Vec<Seen> {
        std::mem::take(&mut *self.seen.lock().unwrap())
    }

    async fn wait_for(&self, count: usize) -> Vec<Seen> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let notified = self.changed.notified();
                if self.seen.lock().unwrap().len() >= count {
                    return self.snapshot();
                }
                notified.await;
            }
        })
        .await
        .expect("sink should observe events in time")
    }
}

impl EventSink for RecordingSink {
    fn on_message_received(&self, conn: &Connection, message: wirelink_conn::Result<Bytes>) {
        self.record(match message {
            Ok(bytes) => Seen::Message(bytes.to_vec()),
            Err(err) => Seen::ReceiveError(err.to_string()),
        });
        if self.dispose_on_message {
            conn.dispose();
        }
    }

    fn on_send_completed(&self, _conn: &Connection, result: wirelink_conn::Result<usize>) {
        self.record(match result {
            Ok(n) => Seen::Sent(n),
            Err(err) => Seen::SendError(err.to_string()),
        });
    }

    fn on_fragment_received(&self, _conn: &Connection) {
        self.record(Seen::Fragment);
    }

    fn on_disconnected(&self, _conn: &Connection, error: Option<ConnectionError>) {
        self.record(Seen::Disconnected(error.map(|e| e.to_string())));
    }

    fn classify_transport_error(&self, _conn: &Connection, error: &TransportError) -> bool {
        if !self.handle_errors {
            return false;
        }
        let kind = error.io_kind().unwrap_or(io::ErrorKind::Other);
        self.record(Seen::Classified(kind));
        true
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn header_arriving_in_pieces_waits_for_the_rest() {
    let frame = encode(0x0102, Some(b"xyz")).unwrap();
    let transport = Arc::new(ScriptedTransport::new(vec![
        Ok(frame[..1].to_vec()),
        Ok(frame[1..5].to_vec()),
        Ok(frame[5..].to_vec()),
    ]));
    let sink = Arc::new(RecordingSink::default());
    let _conn = Connection::open_shared(transport, sink.clone(), ConnectionConfig::default())
        .unwrap();

    let seen = sink.wait_for(4).await;
    assert_eq!(
        seen,
        vec![
            Seen::Fragment,
            Seen::Fragment,
            Seen::Fragment,
            Seen::Message(vec![0x02, 0x01, b'x', b'y', b'z']),
        ]
    );
}

#[tokio::test]
async fn small_receive_buffer_still_reassembles() {
    let payload = vec![0x42; 100];
    let frame = encode(8, Some(&payload)).unwrap();
    let reads = frame.chunks(16).map(|c| Ok(c.to_vec())).collect();
    let transport = Arc::new(ScriptedTransport::new(reads));
    let sink = Arc::new(RecordingSink::default());
    let config = ConnectionConfig {
        receive_buffer_size: 16,
        ..ConnectionConfig::default()
    };
    let _conn = Connection::open_shared(transport, sink.clone(), config).unwrap();

    let chunks = frame.len().div_ceil(16);
    let seen = sink.wait_for(chunks + 1).await;
    let Some(Seen::Message(message)) = seen.last() else {
        panic!("expected a message last, got {seen:?}");
    };
    assert_eq!(message.len(), 2 + payload.len());
}

#[tokio::test]
async fn unclassified_receive_error_is_surfaced_once() {
    let transport = Arc::new(ScriptedTransport::new(vec![Err(
        io::ErrorKind::ConnectionReset,
    )]));
    let sink = Arc::new(RecordingSink::default());
    let _conn = Connection::open_shared(transport, sink.clone(), ConnectionConfig::default())
        .unwrap();

    let seen = sink.wait_for(1).await;
    assert!(matches!(&seen[0], Seen::ReceiveError(msg) if msg.contains("transport error")));
    settle().await;
    assert!(sink.snapshot().is_empty());
}

#[tokio::test]
async fn classified_receive_error_is_not_surfaced() {
    let transport = Arc::new(ScriptedTransport::new(vec![Err(
        io::ErrorKind::ConnectionAborted,
    )]));
    let sink = Arc::new(RecordingSink::handling_errors());
    let _conn = Connection::open_shared(transport, sink.clone(), ConnectionConfig::default())
        .unwrap();

    let seen = sink.wait_for(1).await;
    assert_eq!(seen, vec![Seen::Classified(io::ErrorKind::ConnectionAborted)]);
    settle().await;
    assert!(sink.snapshot().is_empty());
}

#[tokio::test]
async fn malformed_length_is_reported_as_frame_error() {
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(vec![3, 0, 0, 0, 0, 0])]));
    let sink = Arc::new(RecordingSink::default());
    let _conn = Connection::open_shared(transport, sink.clone(), ConnectionConfig::default())
        .unwrap();

    let seen = sink.wait_for(2).await;
    assert_eq!(seen[0], Seen::Fragment);
    assert!(matches!(&seen[1], Seen::ReceiveError(msg) if msg.contains("frame error")));
}

#[tokio::test]
async fn rejected_frame_stops_receiving_but_allows_disconnect() {
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(vec![3, 0, 0, 0, 0, 0])]));
    let sink = Arc::new(RecordingSink::default());
    let conn = Connection::open_shared(
        transport.clone(),
        sink.clone(),
        ConnectionConfig::default(),
    )
    .unwrap();
    assert!(conn.is_receiving());

    sink.wait_for(2).await;
    assert!(!conn.is_receiving());
    assert_eq!(conn.state(), ConnectionState::Active);

    // Bytes arriving now are never read.
    transport.push_read(Ok(encode(1, None).unwrap().to_vec()));
    conn.send_message(1, None).unwrap();
    conn.disconnect().unwrap();

    let seen = sink.wait_for(2).await;
    assert_eq!(seen, vec![Seen::Sent(6), Seen::Disconnected(None)]);
    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert!(!conn.is_receiving());
}

#[tokio::test]
async fn unclassified_send_error_is_reported_to_the_sink() {
    let transport = Arc::new(ScriptedTransport {
        fail_send: true,
        ..ScriptedTransport::new(Vec::new())
    });
    let sink = Arc::new(RecordingSink::default());
    let conn = Connection::open_shared(
        transport.clone(),
        sink.clone(),
        ConnectionConfig::default(),
    )
    .unwrap();

    conn.send_message(3, Some(b"lost")).unwrap();

    let seen = sink.wait_for(1).await;
    assert!(
        matches!(&seen[..], [Seen::SendError(msg)] if msg.contains("transport error")),
        "unexpected events: {seen:?}"
    );
    settle().await;
    assert!(sink.snapshot().is_empty());
    assert!(transport.written.lock().unwrap().is_empty());
}

#[tokio::test]
async fn classified_send_error_suppresses_completion() {
    let transport = Arc::new(ScriptedTransport {
        fail_send: true,
        ..ScriptedTransport::new(Vec::new())
    });
    let sink = Arc::new(RecordingSink::handling_errors());
    let conn = Connection::open_shared(transport, sink.clone(), ConnectionConfig::default())
        .unwrap();

    conn.send_message(3, Some(b"lost")).unwrap();

    let seen = sink.wait_for(1).await;
    assert_eq!(seen, vec![Seen::Classified(io::ErrorKind::BrokenPipe)]);
    settle().await;
    assert!(sink.snapshot().is_empty());
}

/// Dispose aborts both driver tasks, so the gated send and the pending read
/// are cancelled rather than completed; nothing but the disconnect is seen.
#[tokio::test]
async fn operations_pending_at_dispose_are_abandoned_silently() {
    let gate = Arc::new(Notify::new());
    let transport = Arc::new(ScriptedTransport {
        send_gate: Some(gate.clone()),
        ..ScriptedTransport::new(Vec::new())
    });
    let sink = Arc::new(RecordingSink::default());
    let conn = Connection::open_shared(
        transport.clone(),
        sink.clone(),
        ConnectionConfig::default(),
    )
    .unwrap();

    conn.send_message(1, Some(b"stuck")).unwrap();
    settle().await;
    conn.dispose();
    gate.notify_one();
    transport.push_read(Ok(encode(2, None).unwrap().to_vec()));
    settle().await;

    assert_eq!(sink.snapshot(), vec![Seen::Disconnected(None)]);
    assert_eq!(transport.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn send_finishing_as_dispose_runs_is_not_reported() {
    let transport = Arc::new(ScriptedTransport::new(Vec::new()));
    let sink = Arc::new(RecordingSink::default());
    let conn = Connection::open_shared(
        transport.clone(),
        sink.clone(),
        ConnectionConfig::default(),
    )
    .unwrap();
    *transport.dispose_on_send.lock().unwrap() = Some(conn.clone());

    conn.send_message(1, Some(b"late")).unwrap();

    let seen = sink.wait_for(1).await;
    assert_eq!(seen, vec![Seen::Disconnected(None)]);
    settle().await;
    assert!(sink.snapshot().is_empty());
    assert_eq!(
        *transport.written.lock().unwrap(),
        encode(1, Some(b"late")).unwrap().to_vec()
    );
}

#[tokio::test]
async fn messages_after_dispose_in_the_same_read_are_dropped() {
    let mut wire = encode(1, Some(b"one")).unwrap().to_vec();
    wire.extend_from_slice(&encode(2, Some(b"two")).unwrap());
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(wire)]));
    let sink = Arc::new(RecordingSink {
        dispose_on_message: true,
        ..RecordingSink::default()
    });
    let conn = Connection::open_shared(transport, sink.clone(), ConnectionConfig::default())
        .unwrap();

    let seen = sink.wait_for(3).await;
    assert_eq!(
        seen,
        vec![
            Seen::Fragment,
            Seen::Message(vec![0x01, 0x00, b'o', b'n', b'e']),
            Seen::Disconnected(None),
        ]
    );
    settle().await;
    assert!(sink.snapshot().is_empty());
    assert!(conn.is_disposed());
}

#[tokio::test]
async fn failed_disconnect_is_reported_with_error() {
    let transport = Arc::new(ScriptedTransport {
        fail_disconnect: true,
        ..ScriptedTransport::new(Vec::new())
    });
    let sink = Arc::new(RecordingSink::default());
    let conn = Connection::open_shared(transport, sink.clone(), ConnectionConfig::default())
        .unwrap();

    conn.disconnect().unwrap();

    let seen = sink.wait_for(1).await;
    assert!(matches!(&seen[0], Seen::Disconnected(Some(msg)) if msg.contains("transport error")));
}

#[tokio::test]
async fn classified_disconnect_error_suppresses_notification() {
    let transport = Arc::new(ScriptedTransport {
        fail_disconnect: true,
        ..ScriptedTransport::new(Vec::new())
    });
    let sink = Arc::new(RecordingSink::handling_errors());
    let conn = Connection::open_shared(transport, sink.clone(), ConnectionConfig::default())
        .unwrap();

    conn.disconnect().unwrap();

    let seen = sink.wait_for(1).await;
    assert_eq!(seen, vec![Seen::Classified(io::ErrorKind::BrokenPipe)]);
    settle().await;
    assert!(sink.snapshot().is_empty());
}

#[tokio::test]
async fn sends_from_one_task_are_written_in_order() {
    let transport = Arc::new(ScriptedTransport::new(Vec::new()));
    let sink = Arc::new(RecordingSink::default());
    let conn = Connection::open_shared(
        transport.clone(),
        sink.clone(),
        ConnectionConfig::default(),
    )
    .unwrap();

    let mut expected = Vec::new();
    for i in 0..20u16 {
        let payload = i.to_be_bytes();
        conn.send_message(i, Some(&payload)).unwrap();
        expected.extend_from_slice(&encode(i, Some(&payload)).unwrap());
    }

    let seen = sink.wait_for(20).await;
    assert!(seen.iter().all(|s| *s == Seen::Sent(8)));
    assert_eq!(*transport.written.lock().unwrap(), expected);
}

#[tokio::test]
async fn sends_queue_without_waiting_for_a_stalled_peer() {
    let gate = Arc::new(Notify::new());
    let transport = Arc::new(ScriptedTransport {
        send_gate: Some(gate.clone()),
        ..ScriptedTransport::new(Vec::new())
    });
    let sink = Arc::new(RecordingSink::default());
    let conn = Connection::open_shared(
        transport.clone(),
        sink.clone(),
        ConnectionConfig::default(),
    )
    .unwrap();

    let mut expected = Vec::new();
    for i in 0..50u16 {
        conn.send_message(i, Some(b"queued")).unwrap();
        expected.extend_from_slice(&encode(i, Some(b"queued")).unwrap());
    }
    settle().await;
    assert!(transport.written.lock().unwrap().is_empty());
    assert!(sink.snapshot().is_empty());

    for _ in 0..50 {
        gate.notify_one();
        assert_eq!(sink.wait_for(1).await, vec![Seen::Sent(12)]);
    }
    assert_eq!(*transport.written.lock().unwrap(), expected);
}
