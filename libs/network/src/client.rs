//! Typed message client
//!
//! Pairs a [`TcpFramedTransport`] with a serializer and a dispatch table.
//! Outbound: `send(tag, &payload)` encodes a tagged frame and queues it.
//! Inbound: every frame is routed by tag to the handler registered for it;
//! frames with unknown tags are reported on the dispatcher's error channel
//! and the connection keeps running.

use crate::transports::{
    ConnectionObserver, FramedTransport, ObserverId, TcpFramedTransport, TcpNetworkConfig,
    TransportMetrics,
};
use crate::{Result, TransportError};
use bytes::Bytes;
use courier_codec::{
    encode_frame, BincodeSerializer, CodecResult, DispatchTable, Dispatcher, Serializer,
};
use serde::Serialize;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use tokio::net::TcpStream;

struct DispatchObserver {
    dispatcher: Arc<Dispatcher>,
}

impl ConnectionObserver for DispatchObserver {
    fn on_frame(&self, frame: Bytes) {
        // Failures are logged and published by the dispatcher itself.
        let _ = self.dispatcher.dispatch(&frame);
    }
}

/// Send-only handle to a client's connection.
///
/// Holds the transport weakly, so handlers can capture it to reply without
/// keeping the connection alive. Sending after the client is dropped
/// reports `NotConnected`.
pub struct MessageSender<S: Serializer = BincodeSerializer> {
    transport: Weak<dyn FramedTransport>,
    serializer: S,
}

impl<S: Serializer> Clone for MessageSender<S> {
    fn clone(&self) -> Self {
        Self {
            transport: Weak::clone(&self.transport),
            serializer: self.serializer.clone(),
        }
    }
}

impl<S: Serializer> MessageSender<S> {
    pub fn new(transport: &Arc<dyn FramedTransport>, serializer: S) -> Self {
        Self {
            transport: Arc::downgrade(transport),
            serializer,
        }
    }

    /// Encode `payload` behind `tag` and queue it on the connection
    pub fn send<T>(&self, tag: u32, payload: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let transport = self.transport.upgrade().ok_or(TransportError::NotConnected)?;
        if !transport.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let frame = encode_frame(&self.serializer, tag, payload)?;
        transport.send_frame(frame)
    }

    pub fn is_connected(&self) -> bool {
        self.transport
            .upgrade()
            .is_some_and(|transport| transport.is_connected())
    }
}

impl<S: Serializer> fmt::Debug for MessageSender<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageSender")
            .field("format", &self.serializer.format())
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Typed request/notification client over one TCP connection
pub struct MessageClient<S: Serializer = BincodeSerializer> {
    transport: Arc<TcpFramedTransport>,
    sender: MessageSender<S>,
    dispatcher: Arc<Dispatcher>,
}

impl<S: Serializer> MessageClient<S> {
    /// Build an unconnected client; inbound frames go through `table`
    pub fn new(serializer: S, table: DispatchTable, config: TcpNetworkConfig) -> Self {
        let transport = Arc::new(TcpFramedTransport::new(config));
        let erased: Arc<dyn FramedTransport> = transport.clone();
        let sender = MessageSender::new(&erased, serializer);
        Self::assemble(transport, sender, table)
    }

    /// Build an unconnected client whose handlers can reply on it.
    ///
    /// `wire` receives this client's sender before any frame can arrive and
    /// returns the dispatch table.
    pub fn with_table<F>(serializer: S, config: TcpNetworkConfig, wire: F) -> CodecResult<Self>
    where
        F: FnOnce(MessageSender<S>) -> CodecResult<DispatchTable>,
    {
        let transport = Arc::new(TcpFramedTransport::new(config));
        let erased: Arc<dyn FramedTransport> = transport.clone();
        let sender = MessageSender::new(&erased, serializer);
        let table = wire(sender.clone())?;
        Ok(Self::assemble(transport, sender, table))
    }

    fn assemble(
        transport: Arc<TcpFramedTransport>,
        sender: MessageSender<S>,
        table: DispatchTable,
    ) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(table));
        transport.add_observer(Arc::new(DispatchObserver {
            dispatcher: Arc::clone(&dispatcher),
        }));

        Self {
            transport,
            sender,
            dispatcher,
        }
    }

    pub async fn connect(&self, remote_addr: SocketAddr) -> Result<()> {
        self.transport.connect(remote_addr).await
    }

    /// Adopt an accepted stream. Must be called inside a tokio runtime.
    pub fn attach(&self, stream: TcpStream) -> Result<()> {
        self.transport.attach(stream)
    }

    pub fn send<T>(&self, tag: u32, payload: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.sender.send(tag, payload)
    }

    /// Cloneable send-only handle
    pub fn sender(&self) -> MessageSender<S> {
        self.sender.clone()
    }

    pub fn close(&self) {
        self.transport.close();
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn add_observer(&self, observer: Arc<dyn ConnectionObserver>) -> ObserverId {
        self.transport.add_observer(observer)
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.transport.remove_observer(id)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.transport.local_addr()
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.transport.peer_addr()
    }

    /// Inbound routing, e.g. to subscribe to undeliverable frames
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn metrics(&self) -> TransportMetrics {
        self.transport.metrics()
    }
}

impl<S: Serializer> fmt::Debug for MessageClient<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageClient")
            .field("peer", &self.peer_addr())
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
