use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::codec::LinkCodec;
use crate::error::StreamError;
use crate::packet::LinkPacket;

/// Packets buffered in each direction before `send` waits.
pub const LINK_QUEUE_DEPTH: usize = 100;

/// A link to the peer chip.
///
/// Reading and writing happen on two background tasks; the handle
/// only talks to them over channels, so sends from one task keep
/// their program order on the wire.
#[derive(Debug)]
pub struct LinkConnection {
    // Channel to send packets to background writer task
    tx: LinkSender,
    // Channel to receive packets from background reader task
    rx: LinkReceiver,
}

impl LinkConnection {
    pub fn new<T>(stream: T) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (mut net_writer, mut net_reader) = Framed::new(stream, LinkCodec).split();

        // User -> Network
        let (user_tx, mut network_rx) = mpsc::channel::<LinkPacket>(LINK_QUEUE_DEPTH);

        // Network -> User
        let (network_tx, user_rx) = mpsc::channel(LINK_QUEUE_DEPTH);

        // Writer task: User -> Network
        tokio::spawn(async move {
            while let Some(packet) = network_rx.recv().await {
                if let Err(e) = net_writer.send(packet).await {
                    warn!("link write error: {e}");
                    break;
                }
            }
            // Every sender is gone: half-close so the peer sees EOF.
            if let Err(e) = net_writer.close().await {
                debug!("link close error: {e}");
            }
            debug!("link writer stopped");
        });

        // Reader task: Network -> User
        tokio::spawn(async move {
            while let Some(result) = net_reader.next().await {
                match result {
                    Ok(packet) => {
                        if network_tx.send(packet).await.is_err() {
                            // receiver was dropped, stop reading
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("link read error: {e}");
                        break;
                    }
                }
            }
            debug!("link reader stopped");
        });

        Self {
            tx: LinkSender(user_tx),
            rx: LinkReceiver(user_rx),
        }
    }

    /// Connect to a peer over TCP.
    pub async fn connect(addr: &str) -> Result<Self, StreamError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }

    /// Two connected in-process endpoints with no byte stream between them.
    pub fn memory_pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::channel(LINK_QUEUE_DEPTH);
        let (b_tx, a_rx) = mpsc::channel(LINK_QUEUE_DEPTH);
        (
            Self {
                tx: LinkSender(a_tx),
                rx: LinkReceiver(a_rx),
            },
            Self {
                tx: LinkSender(b_tx),
                rx: LinkReceiver(b_rx),
            },
        )
    }

    pub async fn send(&self, packet: LinkPacket) -> Result<(), StreamError> {
        self.tx.send(packet).await
    }

    pub async fn recv(&mut self) -> Option<LinkPacket> {
        self.rx.recv().await
    }

    pub fn sender(&self) -> LinkSender {
        self.tx.clone()
    }

    /// Separate the two directions so they can live on different tasks.
    pub fn split(self) -> (LinkSender, LinkReceiver) {
        (self.tx, self.rx)
    }
}

/// Cloneable sending half of a [`LinkConnection`].
#[derive(Debug, Clone)]
pub struct LinkSender(mpsc::Sender<LinkPacket>);

impl LinkSender {
    pub async fn send(&self, packet: LinkPacket) -> Result<(), StreamError> {
        self.0.send(packet).await?;
        Ok(())
    }
}

/// Receiving half of a [`LinkConnection`].
#[derive(Debug)]
pub struct LinkReceiver(mpsc::Receiver<LinkPacket>);

impl LinkReceiver {
    /// Wait for the next packet. `None` once the link is closed.
    pub async fn recv(&mut self) -> Option<LinkPacket> {
        self.0.recv().await
    }

    /// Take a packet if one is already queued.
    pub fn try_recv(&mut self) -> Option<LinkPacket> {
        self.0.try_recv().ok()
    }
}
