//! Wire protocol constants
//!
//! A frame on the wire is `[u32 BE length][u32 LE type tag][payload]`. The
//! length prefix belongs to the TCP transport; the tag belongs to the typed
//! message layer.

/// Size of the type tag that starts every application frame
pub const TYPE_TAG_SIZE: usize = 4;

/// Size of the length prefix written by the TCP transport
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Largest frame the TCP transport accepts (16MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Initial capacity of per-connection read buffers (64KB)
pub const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Default TCP connect timeout (milliseconds)
pub const CONNECT_TIMEOUT_MS: u64 = 5_000;
