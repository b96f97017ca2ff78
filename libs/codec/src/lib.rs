//! # Courier Frame Codec
//!
//! ## Purpose
//!
//! The "rules" layer between actors and the network: how a typed message
//! becomes a frame and how a received frame finds its handler.
//!
//! - **Frame layout**: `[u32 LE type tag][payload]`, parsed through a
//!   zerocopy header view with the payload borrowed in place
//! - **Serializers**: pluggable [`Serializer`] capability with bincode and
//!   JSON implementations
//! - **Dispatch**: a tag → (deserializer, handler) [`DispatchTable`] built
//!   once at wiring time and a [`Dispatcher`] that reports undeliverable
//!   frames instead of failing the connection
//!
//! ## Architecture Role
//!
//! ```text
//! libs/actors        [codec]                  libs/network
//!  handlers  ◀── Dispatcher ◀── Frame::parse ◀── reader task
//!  send(tag) ──▶ encode_frame ─────────────────▶ writer task
//! ```
//!
//! ## What This Crate Does NOT Contain
//! - Length prefixing or socket handling (belongs in network/)
//! - Actor scheduling (belongs in actors/)

pub mod dispatch;
pub mod error;
pub mod frame;
pub mod serializer;

pub use dispatch::{DispatchStats, DispatchTable, DispatchTableBuilder, Dispatcher};
pub use error::{CodecError, CodecResult, DispatchError};
pub use frame::{encode_frame, tag_only_frame, Frame, FrameHeader};
pub use serializer::{BincodeSerializer, JsonSerializer, Serializer};
