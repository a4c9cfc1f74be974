use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Lifecycle state of a connection.
///
/// `Active → Disconnecting → Disconnected`; `Disposed` is reachable from any
/// state and is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Sends are accepted. A receive is outstanding unless an inbound error
    /// stopped it; see [`Connection::is_receiving`](crate::Connection::is_receiving).
    Active,
    /// Graceful shutdown was requested; no receive is re-armed.
    Disconnecting,
    /// The peer closed or a graceful shutdown completed.
    Disconnected,
    /// Torn down by `dispose`.
    Disposed,
}

const ACTIVE: u8 = 0;
const DISCONNECTING: u8 = 1;
const DISCONNECTED: u8 = 2;

/// Atomic holder for the non-terminal lifecycle states.
///
/// Whether the receive loop is still running is tracked separately: an
/// inbound error ends receiving without ending the connection, so
/// `disconnect` stays available.
#[derive(Debug)]
pub(crate) struct StateCell {
    phase: AtomicU8,
    receiving: AtomicBool,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self {
            phase: AtomicU8::new(ACTIVE),
            receiving: AtomicBool::new(true),
        }
    }

    pub(crate) fn load(&self) -> ConnectionState {
        match self.phase.load(Ordering::Acquire) {
            ACTIVE => ConnectionState::Active,
            DISCONNECTING => ConnectionState::Disconnecting,
            _ => ConnectionState::Disconnected,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.phase.load(Ordering::Acquire) == ACTIVE
    }

    pub(crate) fn is_receiving(&self) -> bool {
        self.receiving.load(Ordering::Acquire) && self.is_active()
    }

    /// Record that the receive loop exited while the connection stayed `Active`.
    pub(crate) fn stop_receiving(&self) {
        self.receiving.store(false, Ordering::Release);
    }

    /// Move from `Active` to `Disconnecting`. False if already past `Active`.
    pub(crate) fn begin_disconnect(&self) -> bool {
        self.phase
            .compare_exchange(ACTIVE, DISCONNECTING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn mark_disconnected(&self) {
        self.phase.store(DISCONNECTED, Ordering::Release);
    }
}
