//! TCP Framed Transport
//!
//! Each frame travels as `[u32 BE length][frame bytes]`. A connection runs
//! two tokio tasks: a reader that delivers frames to observers in arrival
//! order, and a writer that drains an unbounded channel and coalesces
//! whatever is queued into one socket write.
//!
//! `send_frame` only pushes onto that channel, so it is safe to call from
//! actor worker threads that have no tokio runtime of their own.

use super::metrics::{MetricsTracker, TransportMetrics};
use super::{ConnectionObserver, FramedTransport, ObserverId, ObserverSet};
use crate::{Result, TransportError};
use bytes::{BufMut, Bytes, BytesMut};
use courier_config::protocol::{
    CONNECT_TIMEOUT_MS, LENGTH_PREFIX_SIZE, MAX_FRAME_SIZE, READ_BUFFER_SIZE,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// TCP transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpNetworkConfig {
    /// Connection timeout (milliseconds)
    pub connect_timeout_ms: u64,
    /// Largest frame accepted or sent
    pub max_message_size: usize,
    /// Read buffer size and write coalescing limit
    pub buffer_size: usize,
    /// Disable Nagle's algorithm
    pub nodelay: bool,
}

impl Default for TcpNetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: CONNECT_TIMEOUT_MS,
            max_message_size: MAX_FRAME_SIZE,
            buffer_size: READ_BUFFER_SIZE,
            nodelay: true,
        }
    }
}

impl TcpNetworkConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

struct Connection {
    writer: mpsc::UnboundedSender<Bytes>,
    reader: JoinHandle<()>,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
}

struct Shared {
    config: TcpNetworkConfig,
    observers: ObserverSet,
    connection: RwLock<Option<Connection>>,
    metrics: MetricsTracker,
}

impl Shared {
    /// Tear the connection down once; later calls are no-ops
    fn disconnect(&self, reason: TransportError) {
        let Some(connection) = self.connection.write().take() else {
            return;
        };

        // Dropping the sender lets the writer flush what is queued, then exit.
        connection.reader.abort();

        match &reason {
            TransportError::Closed => {
                info!(peer = %connection.peer_addr, "Closed TCP connection")
            }
            TransportError::Connection { .. } => {
                info!(peer = %connection.peer_addr, "TCP peer closed the connection")
            }
            other => {
                warn!(peer = %connection.peer_addr, error = %other, "TCP connection lost")
            }
        }
        self.observers.disconnected(&reason);
    }
}

/// Framed TCP connection.
///
/// Created unconnected so observers can be registered before the first frame
/// can arrive; then [`connect`](Self::connect) or [`attach`](Self::attach).
/// Dropping the transport closes the connection.
pub struct TcpFramedTransport {
    shared: Arc<Shared>,
}

impl TcpFramedTransport {
    pub fn new(config: TcpNetworkConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                observers: ObserverSet::default(),
                connection: RwLock::new(None),
                metrics: MetricsTracker::new(),
            }),
        }
    }

    /// Connect to `remote_addr` and start the I/O tasks
    pub async fn connect(&self, remote_addr: SocketAddr) -> Result<()> {
        let timeout = self.shared.config.connect_timeout();
        info!("Connecting to TCP peer at {}", remote_addr);

        let stream = tokio::time::timeout(timeout, TcpStream::connect(remote_addr))
            .await
            .map_err(|_| TransportError::timeout("TCP connect", timeout.as_millis() as u64))?
            .map_err(|e| TransportError::network_with_source("Failed to connect to TCP peer", e))?;

        self.attach(stream)?;
        info!("Successfully connected to TCP peer at {}", remote_addr);
        Ok(())
    }

    /// Adopt an established stream (e.g. from [`TcpFrameListener::accept`]).
    ///
    /// Must be called from within a tokio runtime.
    pub fn attach(&self, stream: TcpStream) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            TransportError::configuration("attach requires a tokio runtime", Some("runtime"))
        })?;

        if self.shared.config.nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                warn!("Failed to set TCP_NODELAY: {}", e);
            }
        }

        let peer_addr = stream
            .peer_addr()
            .map_err(|e| TransportError::network_with_source("Failed to get peer address", e))?;
        let local_addr = stream
            .local_addr()
            .map_err(|e| TransportError::network_with_source("Failed to get local address", e))?;

        let (start_tx, start_rx) = oneshot::channel();
        {
            let mut slot = self.shared.connection.write();
            if slot.is_some() {
                return Err(TransportError::connection(
                    "Transport is already connected",
                    Some(peer_addr),
                ));
            }

            let (read_half, write_half) = stream.into_split();
            let (writer, queue) = mpsc::unbounded_channel();
            runtime.spawn(run_writer(Arc::clone(&self.shared), write_half, queue));
            let reader = runtime.spawn(run_reader(
                Arc::clone(&self.shared),
                read_half,
                peer_addr,
                start_rx,
            ));

            *slot = Some(Connection {
                writer,
                reader,
                local_addr,
                peer_addr,
            });
        }

        debug!(peer = %peer_addr, local = %local_addr, "TCP connection attached");
        self.shared.observers.connected(peer_addr);
        // Reader may already be gone if the connection was closed meanwhile.
        let _ = start_tx.send(());
        Ok(())
    }

    pub fn config(&self) -> &TcpNetworkConfig {
        &self.shared.config
    }

    pub fn metrics(&self) -> TransportMetrics {
        self.shared.metrics.snapshot()
    }
}

impl FramedTransport for TcpFramedTransport {
    fn send_frame(&self, frame: Bytes) -> Result<()> {
        let max = self.shared.config.max_message_size;
        if frame.len() > max {
            return Err(TransportError::protocol(format!(
                "Message size {} exceeds maximum {}",
                frame.len(),
                max
            )));
        }

        let connection = self.shared.connection.read();
        let connection = connection.as_ref().ok_or(TransportError::NotConnected)?;
        connection
            .writer
            .send(frame)
            .map_err(|_| TransportError::NotConnected)
    }

    fn is_connected(&self) -> bool {
        self.shared.connection.read().is_some()
    }

    fn close(&self) {
        self.shared.disconnect(TransportError::Closed);
    }

    fn add_observer(&self, observer: Arc<dyn ConnectionObserver>) -> ObserverId {
        self.shared.observers.add(observer)
    }

    fn remove_observer(&self, id: ObserverId) -> bool {
        self.shared.observers.remove(id)
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.shared.connection.read().as_ref().map(|c| c.local_addr)
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.shared.connection.read().as_ref().map(|c| c.peer_addr)
    }
}

impl Drop for TcpFramedTransport {
    fn drop(&mut self) {
        self.shared.disconnect(TransportError::Closed);
    }
}

async fn run_writer(
    shared: Arc<Shared>,
    mut stream: OwnedWriteHalf,
    mut queue: mpsc::UnboundedReceiver<Bytes>,
) {
    let limit = shared.config.buffer_size;
    let mut write_buffer = BytesMut::with_capacity(limit);
    let mut batch: Vec<usize> = Vec::new();

    while let Some(frame) = queue.recv().await {
        write_buffer.clear();
        batch.clear();
        push_frame(&mut write_buffer, &mut batch, &frame);

        while write_buffer.len() < limit {
            match queue.try_recv() {
                Ok(frame) => push_frame(&mut write_buffer, &mut batch, &frame),
                Err(_) => break,
            }
        }

        let started = Instant::now();
        if let Err(e) = stream.write_all(&write_buffer).await {
            shared.metrics.record_error();
            shared.disconnect(TransportError::network_with_source("Failed to write frame", e));
            return;
        }

        shared
            .metrics
            .record_write(batch.len(), write_buffer.len(), started.elapsed());
        trace!(frames = batch.len(), bytes = write_buffer.len(), "Wrote frame batch");
        for len in &batch {
            shared.observers.sent(*len);
        }
    }

    if let Err(e) = stream.shutdown().await {
        debug!("Error shutting down TCP write half: {}", e);
    }
}

fn push_frame(buffer: &mut BytesMut, batch: &mut Vec<usize>, frame: &Bytes) {
    buffer.reserve(LENGTH_PREFIX_SIZE + frame.len());
    buffer.put_u32(frame.len() as u32);
    buffer.extend_from_slice(frame);
    batch.push(frame.len());
}

async fn run_reader(
    shared: Arc<Shared>,
    stream: OwnedReadHalf,
    peer_addr: SocketAddr,
    start: oneshot::Receiver<()>,
) {
    if start.await.is_err() {
        return;
    }

    let max_size = shared.config.max_message_size;
    let mut stream = BufReader::with_capacity(shared.config.buffer_size, stream);
    let mut read_buffer = BytesMut::with_capacity(shared.config.buffer_size);

    let reason = loop {
        match receive_frame(&mut stream, &mut read_buffer, max_size, peer_addr).await {
            Ok(frame) => {
                shared.metrics.record_receive(frame.len());
                shared.observers.frame(&frame);
            }
            Err(e) => break e,
        }
    };

    if !matches!(reason, TransportError::Connection { .. }) {
        shared.metrics.record_error();
    }
    shared.disconnect(reason);
}

async fn receive_frame(
    stream: &mut BufReader<OwnedReadHalf>,
    read_buffer: &mut BytesMut,
    max_size: usize,
    peer_addr: SocketAddr,
) -> Result<Bytes> {
    let message_len = match stream.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
            return Err(TransportError::connection(
                "Peer closed the connection",
                Some(peer_addr),
            ));
        }
        Err(e) => {
            return Err(TransportError::network_with_source(
                "Failed to read message length",
                e,
            ))
        }
    };

    if message_len > max_size {
        return Err(TransportError::protocol(format!(
            "Message size {} exceeds maximum {}",
            message_len, max_size
        )));
    }

    // Reuse the existing allocation where possible
    read_buffer.resize(message_len, 0);
    stream
        .read_exact(&mut read_buffer[..])
        .await
        .map_err(|e| TransportError::network_with_source("Failed to read message data", e))?;

    Ok(read_buffer.split_to(message_len).freeze())
}

/// Accepts inbound TCP connections for framed transports
pub struct TcpFrameListener {
    listener: TcpListener,
    config: TcpNetworkConfig,
}

impl TcpFrameListener {
    pub async fn bind(bind_addr: SocketAddr, config: TcpNetworkConfig) -> Result<Self> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| TransportError::network_with_source("Failed to bind TCP listener", e))?;

        info!(
            "TCP server listening on {}",
            listener.local_addr().unwrap_or(bind_addr)
        );
        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| TransportError::network_with_source("Failed to get local address", e))
    }

    /// Wait for the next inbound connection.
    ///
    /// The stream is returned raw so observers can be registered on a
    /// transport before it is attached.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        let (stream, peer_addr) = self
            .listener
            .accept()
            .await
            .map_err(|e| TransportError::network_with_source("Failed to accept TCP connection", e))?;

        info!("Accepted TCP connection from {}", peer_addr);
        Ok((stream, peer_addr))
    }

    /// Accept one connection into a new transport carrying `observers`
    pub async fn accept_transport(
        &self,
        observers: impl IntoIterator<Item = Arc<dyn ConnectionObserver>>,
    ) -> Result<TcpFramedTransport> {
        let (stream, _) = self.accept().await?;
        let transport = TcpFramedTransport::new(self.config.clone());
        for observer in observers {
            transport.add_observer(observer);
        }
        transport.attach(stream)?;
        Ok(transport)
    }

    pub fn config(&self) -> &TcpNetworkConfig {
        &self.config
    }
}
