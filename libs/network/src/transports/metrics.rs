//! Transport Metrics
//!
//! Lock-free counters plus a small reservoir of socket write latencies.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Point-in-time view of a transport's counters
#[derive(Debug, Clone, Default)]
pub struct TransportMetrics {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub errors: u64,
    pub avg_write_latency_ns: u64,
    pub p99_write_latency_ns: u64,
    pub last_activity: Option<Instant>,
}

/// Performance metrics tracker for transport operations
#[derive(Clone, Default)]
pub struct MetricsTracker {
    frames_sent: Arc<AtomicU64>,
    frames_received: Arc<AtomicU64>,
    bytes_sent: Arc<AtomicU64>,
    bytes_received: Arc<AtomicU64>,
    errors: Arc<AtomicU64>,
    latency: Arc<RwLock<LatencyTracker>>,
    last_activity: Arc<RwLock<Option<Instant>>>,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one socket write carrying `frames` frames
    #[inline]
    pub fn record_write(&self, frames: usize, bytes: usize, latency: Duration) {
        self.frames_sent.fetch_add(frames as u64, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);

        // Skip the sample rather than contend with a snapshot reader.
        if let Some(mut tracker) = self.latency.try_write() {
            tracker.record(latency.as_nanos() as u64);
        }
        *self.last_activity.write() = Some(Instant::now());
    }

    #[inline]
    pub fn record_receive(&self, bytes: usize) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
        *self.last_activity.write() = Some(Instant::now());
    }

    #[inline]
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TransportMetrics {
        let latency = self.latency.read();

        TransportMetrics {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            avg_write_latency_ns: latency.average(),
            p99_write_latency_ns: latency.percentile(99),
            last_activity: *self.last_activity.read(),
        }
    }
}

/// Latency percentile tracker over a ring of recent samples
#[derive(Default)]
struct LatencyTracker {
    samples: Vec<u64>,
    position: usize,
    total_samples: u64,
    sum: u64,
}

impl LatencyTracker {
    const SAMPLE_SIZE: usize = 1000;

    fn record(&mut self, latency_ns: u64) {
        self.sum = self.sum.saturating_add(latency_ns);
        self.total_samples += 1;

        if self.samples.len() < Self::SAMPLE_SIZE {
            self.samples.push(latency_ns);
        } else {
            self.samples[self.position] = latency_ns;
            self.position = (self.position + 1) % Self::SAMPLE_SIZE;
        }
    }

    fn average(&self) -> u64 {
        if self.total_samples > 0 {
            self.sum / self.total_samples
        } else {
            0
        }
    }

    fn percentile(&self, p: usize) -> u64 {
        if self.samples.is_empty() {
            return 0;
        }

        let mut sorted = self.samples.clone();
        sorted.sort_unstable();
        let index = ((sorted.len() - 1) * p) / 100;
        sorted[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = MetricsTracker::new();
        metrics.record_write(3, 120, Duration::from_micros(10));
        metrics.record_write(1, 40, Duration::from_micros(30));
        metrics.record_receive(16);
        metrics.record_error();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.frames_sent, 4);
        assert_eq!(snapshot.bytes_sent, 160);
        assert_eq!(snapshot.frames_received, 1);
        assert_eq!(snapshot.bytes_received, 16);
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.avg_write_latency_ns, 20_000);
        assert_eq!(snapshot.p99_write_latency_ns, 10_000);
        assert!(snapshot.last_activity.is_some());
    }

    #[test]
    fn test_percentile_over_ring() {
        let mut tracker = LatencyTracker::default();
        for ns in 1..=100 {
            tracker.record(ns);
        }
        assert_eq!(tracker.percentile(50), 50);
        assert_eq!(tracker.percentile(99), 99);
        assert_eq!(tracker.percentile(100), 100);
    }
}
