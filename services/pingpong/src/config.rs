//! Harness configuration
//!
//! Loaded from an optional TOML file plus `COURIER__*` environment
//! overrides, then adjusted by command-line flags.
//!
//! ```toml
//! repeat = 1000000
//! clients = 4
//! mode = "tcp"
//!
//! [executor]
//! queue_capacity = 4096
//!
//! [tcp]
//! max_message_size = 1024
//! ```

use courier_actors::ExecutorSettings;
use courier_config::runtime::bench::{
    BASE_REPEAT, DEFAULT_CLIENTS, DEFAULT_MAX_ROUNDS, INITIAL_BURST, MAX_RED_ROUNDS, REPEAT_FACTOR,
};
use courier_network::TcpNetworkConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Environment prefix for overrides, e.g. `COURIER__CLIENTS=4`
pub const ENV_PREFIX: &str = "COURIER";

/// Where destinations live relative to their clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Every actor in this process
    Local,
    /// Destinations behind loopback TCP message clients
    Tcp,
}

/// How an actor method moves onto its context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    /// `ctx.post(closure)`
    Post,
    /// `ctx.spawn(async { ctx.switch_to().await; .. })`
    Await,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Pings per round across all clients
    pub repeat: u64,
    /// Client/destination pairs
    pub clients: usize,
    /// Pings each client fires before waiting on pongs
    pub initial_burst: u64,
    /// Non-improving rounds tolerated before stopping
    pub max_red_rounds: u32,
    /// Hard cap on rounds
    pub max_rounds: u32,
    pub mode: Mode,
    pub style: Style,
    /// Listener address for TCP mode
    pub bind_address: SocketAddr,
    pub executor: ExecutorSettings,
    pub tcp: TcpNetworkConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            repeat: BASE_REPEAT * REPEAT_FACTOR,
            clients: DEFAULT_CLIENTS,
            initial_burst: INITIAL_BURST,
            max_red_rounds: MAX_RED_ROUNDS,
            max_rounds: DEFAULT_MAX_ROUNDS,
            mode: Mode::Local,
            style: Style::Post,
            bind_address: SocketAddr::from(([127, 0, 0, 1], 0)),
            executor: ExecutorSettings::default(),
            tcp: TcpNetworkConfig::default(),
        }
    }
}

impl BenchConfig {
    /// Defaults, then `path` (if any), then environment overrides
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        courier_config::load_config(path, ENV_PREFIX)
    }

    /// Pings each client sends; the remainder of an uneven split is dropped
    pub fn repeat_per_client(&self) -> u64 {
        if self.clients == 0 {
            0
        } else {
            self.repeat / self.clients as u64
        }
    }

    /// Pings a client has in flight at once
    pub fn effective_burst(&self) -> u64 {
        self.initial_burst.min(self.repeat_per_client())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.clients > 0, "clients must be at least 1");
        anyhow::ensure!(self.max_rounds > 0, "max_rounds must be at least 1");

        // A client blocked on its destination's full mailbox cannot drain the
        // pongs the destination is blocked posting back.
        let capacity = self.executor.queue_capacity as u64;
        let burst = self.effective_burst();
        anyhow::ensure!(
            capacity == 0 || capacity > burst,
            "executor.queue_capacity ({}) must exceed the in-flight burst ({}) or be 0 (unbounded)",
            capacity,
            burst
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BenchConfig::default();
        assert_eq!(config.repeat, 15_000_000);
        assert_eq!(config.clients, 8);
        assert_eq!(config.repeat_per_client(), 1_875_000);
        assert_eq!(config.initial_burst, 1_000);
        assert_eq!(config.max_red_rounds, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
repeat = 4000
clients = 2
mode = "tcp"
style = "await"

[executor]
queue_capacity = 128

[tcp]
max_message_size = 512
"#
        )
        .unwrap();

        let config = BenchConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.repeat, 4000);
        assert_eq!(config.clients, 2);
        assert_eq!(config.mode, Mode::Tcp);
        assert_eq!(config.style, Style::Await);
        assert_eq!(config.executor.queue_capacity, 128);
        assert_eq!(config.executor.poll_interval_ms, 50);
        assert_eq!(config.tcp.max_message_size, 512);
        assert!(config.tcp.nodelay);
    }

    #[test]
    fn test_mailbox_smaller_than_burst_rejected() {
        let mut config = BenchConfig {
            repeat: 8_000,
            clients: 4,
            initial_burst: 1_000,
            executor: ExecutorSettings::bounded(1_000),
            ..BenchConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("queue_capacity"));

        config.executor = ExecutorSettings::bounded(1_001);
        assert!(config.validate().is_ok());

        // The burst is capped by the per-client share.
        config.repeat = 400;
        config.executor = ExecutorSettings::bounded(101);
        assert_eq!(config.effective_burst(), 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_clients_rejected() {
        let config = BenchConfig {
            clients: 0,
            ..BenchConfig::default()
        };
        assert_eq!(config.repeat_per_client(), 0);
        assert!(config.validate().is_err());
    }
}
