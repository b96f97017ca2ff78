//! TCP wiring for the harness
//!
//! Destinations sit behind a [`TcpFrameListener`]; each accepted connection
//! gets its own destination context and answers `Ping` frames with `Pong`
//! frames. Clients reach their destination through a [`MessageClient`] and
//! feed received pongs back into their own context.

use crate::actors::{on_context, Client, Ping, PingTarget, Pong, PING_TAG, PONG_TAG};
use crate::config::Style;
use courier_actors::{ActorContext, ExecutorSettings};
use courier_codec::{BincodeSerializer, DispatchTable};
use courier_network::{MessageClient, MessageSender, TcpFrameListener, TcpNetworkConfig};
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Client-side stand-in for a destination on the other end of a socket
pub struct RemoteDestination {
    sender: MessageSender<BincodeSerializer>,
}

impl RemoteDestination {
    pub fn new(sender: MessageSender<BincodeSerializer>) -> Arc<Self> {
        Arc::new(Self { sender })
    }
}

impl PingTarget for RemoteDestination {
    fn ping(&self, _from: &Arc<Client>, ping: Ping) {
        if let Err(e) = self.sender.send(PING_TAG, &ping) {
            warn!(seq = ping.seq, error = %e, "Ping not sent");
        }
    }
}

/// Destination actor serving one accepted connection
pub struct ServedDestination {
    pub ctx: ActorContext,
    pub connection: MessageClient<BincodeSerializer>,
}

/// Accept `count` connections, each answered by a fresh destination context
pub async fn serve_destinations(
    listener: TcpFrameListener,
    count: usize,
    executor: ExecutorSettings,
    style: Style,
) -> anyhow::Result<Vec<ServedDestination>> {
    let mut served = Vec::with_capacity(count);

    for index in 0..count {
        let ctx = ActorContext::with_settings(
            Some(&format!("destination-{}", index)),
            executor.clone(),
        )?;
        let worker = ctx.clone();

        let connection = MessageClient::with_table(
            BincodeSerializer,
            listener.config().clone(),
            move |reply| {
                Ok(DispatchTable::builder(BincodeSerializer)
                    .on::<Ping, _>(PING_TAG, move |ping| {
                        let reply = reply.clone();
                        on_context(&worker, style, move || {
                            if let Err(e) = reply.send(PONG_TAG, &Pong { seq: ping.seq }) {
                                warn!(seq = ping.seq, error = %e, "Pong not sent");
                            }
                        });
                    })?
                    .build())
            },
        )?;

        let (stream, peer) = listener.accept().await?;
        connection.attach(stream)?;
        debug!(index, peer = %peer, "Destination serving connection");
        served.push(ServedDestination { ctx, connection });
    }

    Ok(served)
}

/// Client actor plus the connection its pongs arrive on
pub struct ConnectedClient {
    pub client: Arc<Client>,
    pub done: tokio::sync::oneshot::Receiver<crate::actors::ClientCounts>,
    pub connection: MessageClient<BincodeSerializer>,
}

/// Connect one client to the destination listener at `addr`
pub async fn connect_client(
    addr: SocketAddr,
    ctx: ActorContext,
    style: Style,
    tcp: TcpNetworkConfig,
    repeat: u64,
    initial_burst: u64,
) -> anyhow::Result<ConnectedClient> {
    let slot: Arc<OnceLock<Arc<Client>>> = Arc::new(OnceLock::new());
    let inbox = Arc::clone(&slot);

    let connection = MessageClient::with_table(BincodeSerializer, tcp, move |_| {
        Ok(DispatchTable::builder(BincodeSerializer)
            .on::<Pong, _>(PONG_TAG, move |pong| match inbox.get() {
                Some(client) => client.pong(pong),
                None => warn!(seq = pong.seq, "Pong before client was wired"),
            })?
            .build())
    })?;
    connection.connect(addr).await?;

    let target = RemoteDestination::new(connection.sender());
    let (client, done) = Client::new(ctx, style, target, repeat, initial_burst);
    // Fresh slot; nothing else can have filled it.
    let _ = slot.set(Arc::clone(&client));

    Ok(ConnectedClient {
        client,
        done,
        connection,
    })
}
