//! Rounds and the stop policy
//!
//! A round wires `clients` client/destination pairs, starts every client and
//! waits on all latches. Throughput is messages per elapsed millisecond,
//! scaled to seconds. The tracker keeps the best round seen; a round that
//! does not beat it is "red", and the harness gives up after more than
//! `max_red_rounds` consecutive red rounds or `max_rounds` in total.

use crate::actors::{Client, ClientCounts, Destination};
use crate::config::{BenchConfig, Mode};
use crate::remote::{connect_client, serve_destinations};
use anyhow::Context;
use courier_actors::ActorContext;
use courier_network::TcpFrameListener;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundReport {
    pub round: u32,
    pub clients: usize,
    /// Pings sent plus pongs received, over all clients
    pub messages: u64,
    pub elapsed: Duration,
    /// Messages per second
    pub throughput: u64,
}

/// Messages per second, computed at millisecond resolution
pub fn throughput(messages: u64, elapsed: Duration) -> u64 {
    let millis = (elapsed.as_millis() as u64).max(1);
    messages / millis * 1000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// New best throughput
    Improved,
    /// No better than the best so far
    Red,
}

#[derive(Debug, Clone)]
pub struct BenchTracker {
    best: u64,
    red_count: u32,
    rounds: u32,
    max_red_rounds: u32,
    max_rounds: u32,
}

impl BenchTracker {
    pub fn new(max_red_rounds: u32, max_rounds: u32) -> Self {
        Self {
            best: 0,
            red_count: 0,
            rounds: 0,
            max_red_rounds,
            max_rounds,
        }
    }

    pub fn record(&mut self, throughput: u64) -> Verdict {
        self.rounds += 1;
        if throughput > self.best {
            self.best = throughput;
            self.red_count = 0;
            Verdict::Improved
        } else {
            self.red_count += 1;
            Verdict::Red
        }
    }

    pub fn should_continue(&self) -> bool {
        self.red_count <= self.max_red_rounds && self.rounds < self.max_rounds
    }

    pub fn best(&self) -> u64 {
        self.best
    }

    pub fn red_count(&self) -> u32 {
        self.red_count
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }
}

struct Wired {
    clients: Vec<Arc<Client>>,
    latches: Vec<oneshot::Receiver<ClientCounts>>,
    contexts: Vec<ActorContext>,
    // Held so the connections stay open for the whole round.
    _connections: Vec<Box<dyn Send>>,
}

async fn wire_local(config: &BenchConfig, round: u32) -> anyhow::Result<Wired> {
    let mut wired = Wired {
        clients: Vec::new(),
        latches: Vec::new(),
        contexts: Vec::new(),
        _connections: Vec::new(),
    };

    for i in 0..config.clients {
        let dest_ctx = ActorContext::with_settings(
            Some(&format!("r{}-destination-{}", round, i)),
            config.executor.clone(),
        )?;
        let client_ctx = ActorContext::with_settings(
            Some(&format!("r{}-client-{}", round, i)),
            config.executor.clone(),
        )?;

        let destination = Destination::new(dest_ctx.clone(), config.style);
        let (client, latch) = Client::new(
            client_ctx.clone(),
            config.style,
            destination,
            config.repeat_per_client(),
            config.initial_burst,
        );

        wired.clients.push(client);
        wired.latches.push(latch);
        wired.contexts.extend([dest_ctx, client_ctx]);
    }

    Ok(wired)
}

async fn wire_tcp(config: &BenchConfig, round: u32) -> anyhow::Result<Wired> {
    let listener = TcpFrameListener::bind(config.bind_address, config.tcp.clone()).await?;
    let addr = listener.local_addr()?;
    let server = tokio::spawn(serve_destinations(
        listener,
        config.clients,
        config.executor.clone(),
        config.style,
    ));

    let mut wired = Wired {
        clients: Vec::new(),
        latches: Vec::new(),
        contexts: Vec::new(),
        _connections: Vec::new(),
    };

    for i in 0..config.clients {
        let ctx = ActorContext::with_settings(
            Some(&format!("r{}-client-{}", round, i)),
            config.executor.clone(),
        )?;
        let connected = connect_client(
            addr,
            ctx.clone(),
            config.style,
            config.tcp.clone(),
            config.repeat_per_client(),
            config.initial_burst,
        )
        .await
        .with_context(|| format!("client {} failed to connect to {}", i, addr))?;

        wired.clients.push(connected.client);
        wired.latches.push(connected.done);
        wired.contexts.push(ctx);
        wired._connections.push(Box::new(connected.connection));
    }

    let served = server.await.context("destination server task failed")??;
    for destination in served {
        wired.contexts.push(destination.ctx);
        wired._connections.push(Box::new(destination.connection));
    }

    Ok(wired)
}

/// Run one round to completion and tear it down
pub async fn run_round(config: &BenchConfig, round: u32) -> anyhow::Result<RoundReport> {
    config.validate()?;
    let wired = match config.mode {
        Mode::Local => wire_local(config, round).await?,
        Mode::Tcp => wire_tcp(config, round).await?,
    };
    debug!(round, clients = wired.clients.len(), mode = ?config.mode, "Round wired");

    let started = Instant::now();
    for client in &wired.clients {
        client.start();
    }

    let mut messages = 0;
    for latch in wired.latches {
        let counts = latch.await.context("client dropped its latch")?;
        messages += counts.sent + counts.received;
    }
    let elapsed = started.elapsed();

    drop(wired._connections);
    for ctx in &wired.contexts {
        ctx.stop().await;
    }

    Ok(RoundReport {
        round,
        clients: config.clients,
        messages,
        elapsed,
        throughput: throughput(messages, elapsed),
    })
}

/// Run rounds until the tracker says stop; `report` sees each round
pub async fn run<F>(config: &BenchConfig, mut report: F) -> anyhow::Result<BenchTracker>
where
    F: FnMut(&RoundReport, Verdict),
{
    let mut tracker = BenchTracker::new(config.max_red_rounds, config.max_rounds);

    loop {
        let round = tracker.rounds() + 1;
        let result = run_round(config, round).await?;
        let verdict = tracker.record(result.throughput);
        info!(
            round,
            throughput = result.throughput,
            best = tracker.best(),
            red_count = tracker.red_count(),
            "Round complete"
        );
        report(&result, verdict);

        if !tracker.should_continue() {
            break;
        }
    }

    Ok(tracker)
}
