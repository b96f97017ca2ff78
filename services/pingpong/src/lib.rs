//! # Courier ping/pong harness
//!
//! Measures message throughput between pairs of actor contexts. Each client
//! sends `Ping`s to its destination, which answers every one with a `Pong`;
//! a round ends when every client has seen all its pongs.
//!
//! Destinations either live in the same process ([`Mode::Local`]) or behind
//! a loopback TCP connection ([`Mode::Tcp`]), and actor methods hop onto
//! their context by posting a closure ([`Style::Post`]) or by awaiting a
//! switch ([`Style::Await`]).

pub mod actors;
pub mod bench;
pub mod config;
pub mod remote;

pub use actors::{Client, ClientCounts, Destination, Ping, PingTarget, Pong, PING_TAG, PONG_TAG};
pub use bench::{run, run_round, throughput, BenchTracker, RoundReport, Verdict};
pub use config::{BenchConfig, Mode, Style, ENV_PREFIX};
