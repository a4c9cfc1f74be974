use std::fmt;
use std::net::{Shutdown, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use bytes::BytesMut;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};
use wirelink_frame::{encode_message, encode_serialized};
use wirelink_transport::{Transport, TransportError};

use crate::config::ConnectionConfig;
use crate::driver::{self, Outbound};
use crate::error::{ConnectionError, Result};
use crate::sink::EventSink;
use crate::state::{ConnectionState, StateCell};

/// A typed-message connection over one connected transport.
///
/// Construction arms a receive loop that keeps exactly one read outstanding
/// and reports complete messages to the [`EventSink`]. Sends are queued to a
/// writer task and confirmed through [`EventSink::on_send_completed`].
///
/// `Connection` is a cheap handle; clones refer to the same connection. The
/// receive loop holds a handle of its own, so a connection stays alive while
/// it is receiving even if the caller keeps none. Call
/// [`dispose`](Self::dispose) to tear it down.
///
/// Frames from a single thread are written in call order, and one frame's
/// bytes are never interleaved with another's. Sends from different threads
/// are written in whatever order they were queued; callers needing a stricter
/// order must serialize their own sends.
///
/// The outbound queue is unbounded and there is no flow control: `send_*`
/// never waits for the peer, so frames sent to a stalled peer pile up in
/// memory. Callers that send faster than the peer reads must pace
/// themselves, for example by waiting for `on_send_completed` before
/// queueing more.
#[derive(Clone)]
pub struct Connection {
    pub(crate) shared: Arc<Shared>,
}

pub(crate) struct Shared {
    id: RwLock<Option<String>>,
    transport: RwLock<Option<Arc<dyn Transport>>>,
    pub(crate) sink: Arc<dyn EventSink>,
    pub(crate) config: ConnectionConfig,
    disposed: AtomicBool,
    disconnect_reported: AtomicBool,
    pub(crate) state: StateCell,
    outbound: mpsc::UnboundedSender<Outbound>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Connection {
    /// Open a connection over an already-connected transport.
    ///
    /// Must be called from within a tokio runtime; the driver tasks are
    /// spawned on it. Fails with [`ConnectionError::InvalidConfiguration`] if
    /// the transport is not connected, the configuration is invalid, or no
    /// runtime is available.
    pub fn open<T>(transport: T, sink: Arc<dyn EventSink>, config: ConnectionConfig) -> Result<Self>
    where
        T: Transport + 'static,
    {
        Self::open_shared(Arc::new(transport), sink, config)
    }

    /// Like [`Connection::open`], for a transport that is already shared.
    pub fn open_shared(
        transport: Arc<dyn Transport>,
        sink: Arc<dyn EventSink>,
        config: ConnectionConfig,
    ) -> Result<Self> {
        config.validate()?;
        if !transport.is_connected() {
            return Err(ConnectionError::InvalidConfiguration(
                "transport is not connected".to_string(),
            ));
        }
        let runtime = Handle::try_current().map_err(|_| {
            ConnectionError::InvalidConfiguration(
                "connections must be opened inside a tokio runtime".to_string(),
            )
        })?;

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            id: RwLock::new(None),
            transport: RwLock::new(Some(Arc::clone(&transport))),
            sink,
            config,
            disposed: AtomicBool::new(false),
            disconnect_reported: AtomicBool::new(false),
            state: StateCell::new(),
            outbound,
            tasks: Mutex::new(Vec::new()),
        });
        let conn = Self { shared };

        let receiver = runtime.spawn(driver::receive_loop(conn.clone(), Arc::clone(&transport)));
        let writer = runtime.spawn(driver::write_loop(
            Arc::downgrade(&conn.shared),
            transport,
            outbound_rx,
        ));
        conn.attach_tasks([receiver, writer]);

        debug!(
            peer = ?conn.remote_endpoint().ok(),
            max_frame_size = conn.shared.config.max_frame_size,
            "connection opened"
        );
        Ok(conn)
    }

    /// Owner-assigned identifier, if any.
    pub fn id(&self) -> Result<Option<String>> {
        self.ensure_live()?;
        Ok(self
            .shared
            .id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    /// Assign an identifier. Replaces any previous one.
    pub fn set_id(&self, id: impl Into<String>) -> Result<()> {
        self.ensure_live()?;
        *self
            .shared
            .id
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(id.into());
        Ok(())
    }

    /// Address of the remote peer.
    pub fn remote_endpoint(&self) -> Result<SocketAddr> {
        Ok(self.transport()?.peer_addr()?)
    }

    /// Local address of the underlying socket.
    pub fn local_endpoint(&self) -> Result<SocketAddr> {
        Ok(self.transport()?.local_addr()?)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        if self.is_disposed() {
            ConnectionState::Disposed
        } else {
            self.shared.state.load()
        }
    }

    /// True while the receive loop is still reading.
    ///
    /// A transport error or a rejected inbound frame stops receiving without
    /// leaving [`ConnectionState::Active`]; sends and
    /// [`disconnect`](Self::disconnect) keep working.
    pub fn is_receiving(&self) -> bool {
        !self.is_disposed() && self.shared.state.is_receiving()
    }

    /// True once [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::Acquire)
    }

    /// Ceiling on total inbound frame size.
    pub fn max_frame_size(&self) -> usize {
        self.shared.config.max_frame_size
    }

    /// Queue a message for sending. Returns once the frame is queued.
    ///
    /// A `None` payload sends a header-only frame.
    pub fn send_message(&self, type_id: u16, payload: Option<&[u8]>) -> Result<()> {
        self.sendable_transport()?;
        let mut frame = BytesMut::new();
        encode_message(type_id, payload, &mut frame)?;
        self.submit(Outbound::Frame(frame.freeze()))
    }

    /// Serialize `value` as JSON and queue it as a message.
    ///
    /// Serialization happens on the calling thread; failures are returned
    /// here rather than reported through the sink.
    pub fn send_object<T>(&self, type_id: u16, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.sendable_transport()?;
        let mut frame = BytesMut::new();
        encode_serialized(type_id, value, &mut frame)?;
        self.submit(Outbound::Frame(frame.freeze()))
    }

    /// Start a graceful disconnect.
    ///
    /// Frames queued before this call are written first. Completion is
    /// reported through [`EventSink::on_disconnected`].
    pub fn disconnect(&self) -> Result<()> {
        self.sendable_transport()?;
        if !self.shared.state.begin_disconnect() {
            return Err(ConnectionError::NotConnected);
        }
        debug!("graceful disconnect requested");
        self.submit(Outbound::Disconnect)
    }

    /// Tear the connection down immediately. Idempotent; never fails.
    ///
    /// If the transport is still connected it is shut down in both
    /// directions and closed, and a single disconnected notification fires.
    /// Any operation issued earlier completes silently.
    pub fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let transport = self
            .shared
            .transport
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(transport) = transport {
            if transport.is_connected() {
                if let Err(err) = transport.shutdown(Shutdown::Both) {
                    debug!(error = %err, "shutdown during dispose failed");
                }
                transport.close();
                self.report_disconnected(None);
            } else {
                transport.close();
            }
        }

        let tasks = std::mem::take(
            &mut *self
                .shared
                .tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for task in tasks {
            task.abort();
        }
        debug!("connection disposed");
    }

    /// Fire `on_disconnected` unless it has already fired.
    pub(crate) fn report_disconnected(&self, error: Option<ConnectionError>) {
        if self.shared.disconnect_reported.swap(true, Ordering::AcqRel) {
            trace!("disconnect already reported");
            return;
        }
        debug!(error = ?error, "connection disconnected");
        self.shared.sink.on_disconnected(self, error);
    }

    /// Offer a transport error to the classifier. True if it was handled.
    pub(crate) fn classify(&self, error: &TransportError) -> bool {
        let handled = self.shared.sink.classify_transport_error(self, error);
        if handled {
            trace!(error = %error, "transport error handled by sink");
        }
        handled
    }

    fn attach_tasks<const N: usize>(&self, handles: [JoinHandle<()>; N]) {
        let mut tasks = self
            .shared
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.is_disposed() {
            // Disposed from a callback before the handles were stored.
            for handle in handles {
                handle.abort();
            }
            return;
        }
        tasks.extend(handles);
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(ConnectionError::Disposed);
        }
        Ok(())
    }

    fn transport(&self) -> Result<Arc<dyn Transport>> {
        self.ensure_live()?;
        self.shared
            .transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ConnectionError::Disposed)
    }

    fn sendable_transport(&self) -> Result<Arc<dyn Transport>> {
        let transport = self.transport()?;
        if !self.shared.state.is_active() || !transport.is_connected() {
            return Err(ConnectionError::NotConnected);
        }
        Ok(transport)
    }

    fn submit(&self, item: Outbound) -> Result<()> {
        self.shared
            .outbound
            .send(item)
            .map_err(|_| ConnectionError::NotConnected)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self
            .shared
            .id
            .read()
            .map(|id| id.clone())
            .unwrap_or_default();
        f.debug_struct("Connection")
            .field("id", &id)
            .field("state", &self.state())
            .field("max_frame_size", &self.shared.config.max_frame_size)
            .finish()
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if !*self.disposed.get_mut() {
            let transport = self
                .transport
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(transport) = transport {
                transport.close();
            }
        }
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}
