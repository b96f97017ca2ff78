//! Runtime defaults for executors and the ping/pong harness.

/// How long the executor worker waits on an empty queue before re-checking
/// its stopping flag (milliseconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Queue capacity meaning "unbounded"
pub const UNBOUNDED_CAPACITY: usize = 0;

/// Error events buffered per executor before slow subscribers lag
pub const ERROR_CHANNEL_CAPACITY: usize = 64;

/// Ping/pong harness defaults
pub mod bench {
    /// Pings exchanged per round are `BASE_REPEAT * REPEAT_FACTOR`
    pub const BASE_REPEAT: u64 = 30_000;

    /// Multiplier applied to `BASE_REPEAT`
    pub const REPEAT_FACTOR: u64 = 500;

    /// Pings a client fires before waiting on pongs
    pub const INITIAL_BURST: u64 = 1_000;

    /// Client/destination pairs
    pub const DEFAULT_CLIENTS: usize = 8;

    /// Non-improving rounds tolerated before the harness gives up
    pub const MAX_RED_ROUNDS: u32 = 3;

    /// Hard cap on rounds
    pub const DEFAULT_MAX_ROUNDS: u32 = 20;
}
