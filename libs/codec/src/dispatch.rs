//! Tag dispatch
//!
//! A [`DispatchTable`] maps each type tag to a deserializer and a handler.
//! It is assembled once through [`DispatchTableBuilder`] and is read-only
//! afterwards. A [`Dispatcher`] routes raw frames through the table and
//! reports every frame it could not deliver on a broadcast channel.
//!
//! Handlers run on the caller's thread (for the TCP transport, the reader
//! task) in delivery order. A panicking handler is contained and reported
//! like any other undeliverable frame. A handler that needs actor ordering should post
//! onto its actor's context instead of touching state directly.

use crate::error::{CodecError, CodecResult, DispatchError};
use crate::frame::Frame;
use crate::serializer::Serializer;
use courier_config::runtime::ERROR_CHANNEL_CAPACITY;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{trace, warn};

type Route = Box<dyn Fn(&[u8]) -> CodecResult<()> + Send + Sync>;

struct Entry {
    type_name: &'static str,
    route: Route,
}

/// Read-only tag → (deserializer, handler) table
pub struct DispatchTable {
    entries: HashMap<u32, Entry>,
    format: &'static str,
}

impl DispatchTable {
    pub fn builder<S: Serializer>(serializer: S) -> DispatchTableBuilder<S> {
        DispatchTableBuilder {
            serializer,
            entries: HashMap::new(),
        }
    }

    pub fn contains(&self, tag: u32) -> bool {
        self.entries.contains_key(&tag)
    }

    /// Registered tags in ascending order
    pub fn tags(&self) -> Vec<u32> {
        let mut tags: Vec<u32> = self.entries.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let routes: Vec<(u32, &'static str)> = self
            .tags()
            .into_iter()
            .map(|tag| (tag, self.entries[&tag].type_name))
            .collect();
        f.debug_struct("DispatchTable")
            .field("format", &self.format)
            .field("routes", &routes)
            .finish()
    }
}

/// Wiring-time builder; duplicate tags are rejected
pub struct DispatchTableBuilder<S: Serializer> {
    serializer: S,
    entries: HashMap<u32, Entry>,
}

impl<S: Serializer> DispatchTableBuilder<S> {
    /// Route frames tagged `tag` to `handler` after decoding them as `T`
    pub fn on<T, F>(self, tag: u32, handler: F) -> CodecResult<Self>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let serializer = self.serializer.clone();
        self.insert(
            tag,
            std::any::type_name::<T>(),
            Box::new(move |payload: &[u8]| {
                let message = serializer.deserialize::<T>(payload)?;
                handler(message);
                Ok(())
            }),
        )
    }

    /// Route frames tagged `tag` to `handler` with the undecoded payload
    pub fn on_raw<F>(self, tag: u32, handler: F) -> CodecResult<Self>
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.insert(
            tag,
            "raw payload",
            Box::new(move |payload: &[u8]| {
                handler(payload);
                Ok(())
            }),
        )
    }

    fn insert(mut self, tag: u32, type_name: &'static str, route: Route) -> CodecResult<Self> {
        if let Some(existing) = self.entries.get(&tag) {
            return Err(CodecError::DuplicateTag {
                tag,
                existing: existing.type_name,
            });
        }
        self.entries.insert(tag, Entry { type_name, route });
        Ok(self)
    }

    pub fn build(self) -> DispatchTable {
        DispatchTable {
            entries: self.entries,
            format: self.serializer.format(),
        }
    }
}

/// Dispatch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: u64,
    pub rejected: u64,
}

/// Routes raw frames through a [`DispatchTable`]
pub struct Dispatcher {
    table: DispatchTable,
    errors: broadcast::Sender<DispatchError>,
    delivered: AtomicU64,
    rejected: AtomicU64,
}

impl Dispatcher {
    pub fn new(table: DispatchTable) -> Self {
        let (errors, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);
        Self {
            table,
            errors,
            delivered: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Decode and deliver one frame, returning its tag.
    ///
    /// Undeliverable frames are logged, published on the error channel and
    /// returned as `Err`; the caller keeps reading.
    pub fn dispatch(&self, bytes: &[u8]) -> Result<u32, DispatchError> {
        let result = self.route(bytes);
        match &result {
            Ok(tag) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                trace!(tag, len = bytes.len(), "Frame dispatched");
            }
            Err(err) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, "Frame discarded");
                // Nobody listening is fine; the warning above is the record.
                let _ = self.errors.send(err.clone());
            }
        }
        result
    }

    fn route(&self, bytes: &[u8]) -> Result<u32, DispatchError> {
        let frame = Frame::parse(bytes)?;
        let tag = frame.tag();

        let entry = self.table.entries.get(&tag).ok_or(DispatchError::UnknownTag {
            tag,
            len: frame.len(),
        })?;

        let routed = catch_unwind(AssertUnwindSafe(|| (entry.route)(frame.payload())))
            .map_err(|payload| DispatchError::from_panic(tag, payload.as_ref()))?;
        routed.map_err(|source| DispatchError::Payload { tag, source })?;
        Ok(tag)
    }

    pub fn subscribe_errors(&self) -> broadcast::Receiver<DispatchError> {
        self.errors.subscribe()
    }

    pub fn table(&self) -> &DispatchTable {
        &self.table
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

impl From<DispatchTable> for Dispatcher {
    fn from(table: DispatchTable) -> Self {
        Self::new(table)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("table", &self.table)
            .field("stats", &self.stats())
            .finish()
    }
}
