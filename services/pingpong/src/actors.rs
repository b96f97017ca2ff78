//! Ping/pong actors
//!
//! A [`Client`] fires an initial burst of pings at its destination and sends
//! one more ping for every pong until it has sent its quota; once it has
//! also received that many pongs it resolves its latch. Every method hops
//! onto the owning actor's context before touching state.

use crate::config::Style;
use courier_actors::ActorContext;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Wire tag of [`Ping`] frames
pub const PING_TAG: u32 = 1;
/// Wire tag of [`Pong`] frames
pub const PONG_TAG: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping {
    pub seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pong {
    pub seq: u64,
}

/// Run `body` on `ctx` in the requested style
pub(crate) fn on_context<F>(ctx: &ActorContext, style: Style, body: F)
where
    F: FnOnce() + Send + 'static,
{
    match style {
        Style::Post => ctx.post(body),
        Style::Await => {
            let worker = ctx.clone();
            ctx.spawn(async move {
                worker.switch_to().await;
                body();
            });
        }
    }
}

/// Where a client's pings go
pub trait PingTarget: Send + Sync + 'static {
    fn ping(&self, from: &Arc<Client>, ping: Ping);
}

/// Answers every ping with a pong, on its own context
pub struct Destination {
    ctx: ActorContext,
    style: Style,
}

impl Destination {
    pub fn new(ctx: ActorContext, style: Style) -> Arc<Self> {
        Arc::new(Self { ctx, style })
    }

    pub fn context(&self) -> &ActorContext {
        &self.ctx
    }
}

impl PingTarget for Destination {
    fn ping(&self, from: &Arc<Client>, ping: Ping) {
        let client = Arc::clone(from);
        on_context(&self.ctx, self.style, move || {
            client.pong(Pong { seq: ping.seq });
        });
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ClientCounts {
    pub sent: u64,
    pub received: u64,
}

struct ClientState {
    counts: ClientCounts,
    latch: Option<oneshot::Sender<ClientCounts>>,
}

pub struct Client {
    ctx: ActorContext,
    style: Style,
    target: Arc<dyn PingTarget>,
    repeat: u64,
    initial_burst: u64,
    state: Mutex<ClientState>,
}

impl Client {
    /// Create a client and the latch that resolves once it is done
    pub fn new(
        ctx: ActorContext,
        style: Style,
        target: Arc<dyn PingTarget>,
        repeat: u64,
        initial_burst: u64,
    ) -> (Arc<Self>, oneshot::Receiver<ClientCounts>) {
        let (latch, done) = oneshot::channel();
        let client = Arc::new(Self {
            ctx,
            style,
            target,
            repeat,
            initial_burst,
            state: Mutex::new(ClientState {
                counts: ClientCounts::default(),
                latch: Some(latch),
            }),
        });
        (client, done)
    }

    /// Fire the initial burst
    pub fn start(self: &Arc<Self>) {
        let me = Arc::clone(self);
        on_context(&self.ctx, self.style, move || {
            let burst = me.initial_burst.min(me.repeat);
            for _ in 0..burst {
                me.send_next();
            }
            if me.repeat == 0 {
                me.finish();
            }
        });
    }

    /// A pong arrived from the target
    pub fn pong(self: &Arc<Self>, pong: Pong) {
        let me = Arc::clone(self);
        on_context(&self.ctx, self.style, move || me.on_pong(pong));
    }

    fn on_pong(self: &Arc<Self>, _pong: Pong) {
        let counts = {
            let mut state = self.state.lock();
            state.counts.received += 1;
            state.counts
        };

        if counts.sent < self.repeat {
            self.send_next();
        } else if counts.received >= self.repeat {
            self.finish();
        }
    }

    fn send_next(self: &Arc<Self>) {
        let seq = {
            let mut state = self.state.lock();
            let seq = state.counts.sent;
            state.counts.sent += 1;
            seq
        };
        self.target.ping(self, Ping { seq });
    }

    fn finish(&self) {
        let mut state = self.state.lock();
        let counts = state.counts;
        if let Some(latch) = state.latch.take() {
            debug!(sent = counts.sent, received = counts.received, "Client finished");
            if latch.send(counts).is_err() {
                warn!("Round abandoned before client finished");
            }
        }
    }

    pub fn counts(&self) -> ClientCounts {
        self.state.lock().counts
    }

    pub fn context(&self) -> &ActorContext {
        &self.ctx
    }
}
