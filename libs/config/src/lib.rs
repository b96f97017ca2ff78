//! # Courier Shared Configuration
//!
//! Constants shared by the runtime crates and a layered configuration loader
//! for binaries.
//!
//! ## Usage
//!
//! ```rust
//! use courier_config::{protocol, runtime};
//!
//! assert_eq!(protocol::TYPE_TAG_SIZE, 4);
//! assert_eq!(runtime::DEFAULT_POLL_INTERVAL_MS, 50);
//! ```

pub mod loader;
pub mod protocol;
pub mod runtime;

pub use loader::{expand_env, load_config, resolve_config_path};
