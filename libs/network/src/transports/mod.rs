//! Framed Transport Layer
//!
//! A framed transport moves discrete frames over a byte stream. Callers hand
//! it complete frames; received frames and lifecycle changes are pushed to
//! registered [`ConnectionObserver`]s.

use crate::Result;
use bytes::Bytes;
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::TransportError;
use tracing::error;

pub mod metrics;
pub mod tcp;

pub use metrics::{MetricsTracker, TransportMetrics};
pub use tcp::{TcpFrameListener, TcpFramedTransport, TcpNetworkConfig};

/// Handle returned by `add_observer`
pub type ObserverId = u64;

/// Receives connection events.
///
/// Callbacks run on the transport's I/O tasks and must not block. A panic
/// in `on_frame` loses that frame only. They must
/// not add or remove observers on the transport that is calling them.
pub trait ConnectionObserver: Send + Sync + 'static {
    /// Connection established; frames follow
    fn on_connected(&self, _peer: SocketAddr) {}

    /// One complete frame arrived
    fn on_frame(&self, frame: Bytes);

    /// Connection ended; fired once per connection
    fn on_disconnected(&self, _reason: &TransportError) {}

    /// A frame of `len` bytes was written to the socket
    fn on_sent(&self, _len: usize) {}
}

/// Connection that sends and receives whole frames
pub trait FramedTransport: Send + Sync + 'static {
    /// Queue `frame` for sending. Never blocks.
    fn send_frame(&self, frame: Bytes) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Close the connection; pending frames are still flushed. Idempotent.
    fn close(&self);

    fn add_observer(&self, observer: Arc<dyn ConnectionObserver>) -> ObserverId;

    /// Returns whether the observer was registered
    fn remove_observer(&self, id: ObserverId) -> bool;

    fn local_addr(&self) -> Option<SocketAddr>;

    fn peer_addr(&self) -> Option<SocketAddr>;
}

/// Registered observers of one transport
#[derive(Default)]
pub(crate) struct ObserverSet {
    next_id: AtomicU64,
    entries: RwLock<Vec<(ObserverId, Arc<dyn ConnectionObserver>)>>,
}

impl ObserverSet {
    pub(crate) fn add(&self, observer: Arc<dyn ConnectionObserver>) -> ObserverId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.write().push((id, observer));
        id
    }

    pub(crate) fn remove(&self, id: ObserverId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    pub(crate) fn connected(&self, peer: SocketAddr) {
        for (_, observer) in self.entries.read().iter() {
            observer.on_connected(peer);
        }
    }

    /// Deliver `frame` to every observer; a panicking observer is logged
    /// and skipped so the reader keeps going
    pub(crate) fn frame(&self, frame: &Bytes) {
        for (id, observer) in self.entries.read().iter() {
            let delivered = catch_unwind(AssertUnwindSafe(|| observer.on_frame(frame.clone())));
            if delivered.is_err() {
                error!(observer = *id, len = frame.len(), "Observer panicked on frame");
            }
        }
    }

    pub(crate) fn disconnected(&self, reason: &TransportError) {
        for (_, observer) in self.entries.read().iter() {
            observer.on_disconnected(reason);
        }
    }

    pub(crate) fn sent(&self, len: usize) {
        for (_, observer) in self.entries.read().iter() {
            observer.on_sent(len);
        }
    }
}
