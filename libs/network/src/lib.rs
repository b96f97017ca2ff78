//! Network Infrastructure
//!
//! Framed TCP transport and the typed message client built on it.
//!
//! ```text
//! MessageClient::send(tag, &msg)
//!     └─ encode_frame ──▶ TcpFramedTransport ──▶ writer task ──▶ socket
//! socket ──▶ reader task ──▶ ConnectionObserver::on_frame ──▶ Dispatcher ──▶ handler
//! ```

pub mod client;
pub mod error;
pub mod transports;

pub use client::{MessageClient, MessageSender};
pub use error::{Result, TransportError};
pub use transports::{
    ConnectionObserver, FramedTransport, MetricsTracker, ObserverId, TcpFrameListener,
    TcpFramedTransport, TcpNetworkConfig, TransportMetrics,
};
