//! Socket-backed link driven by a background tokio task.
//!
//! Each call to [`Link::open`] spawns a fresh supervisor that keeps trying to
//! establish a connection, then pumps frames in both directions until the
//! connection drops or the session closes it. A dropped connection ends that
//! supervisor; the session replaces the link rather than reusing it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use log::{debug, info, trace, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::LinkConfig;
use crate::protocol::codec::{Codec, FrameBuffer};
use crate::protocol::{Envelope, Message};
use crate::transport::{LinkEvent, LinkMode, LinkStatus, SharedStatus, Transport};

/// Read half, write half and a printable peer name.
pub struct Conduit {
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    pub writer: Box<dyn AsyncWrite + Send + Unpin>,
    pub peer: String,
}

impl Conduit {
    pub fn from_tcp(stream: TcpStream) -> Self {
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".into());
        let (reader, writer) = stream.into_split();
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            peer,
        }
    }
}

/// Produces one connection per call, either by accepting or by initiating.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn establish(&self) -> anyhow::Result<Conduit>;

    /// Side this connector takes once connected.
    fn mode(&self) -> LinkMode;

    /// Pause before the next attempt after a failure.
    fn retry_delay(&self, config: &LinkConfig) -> Duration;
}

/// Accepts one peer at a time on a listener bound up front.
pub struct TcpAcceptor {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpAcceptor {
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await.context("bind listener")?;
        let local_addr = listener.local_addr()?;
        info!("listening on {}", local_addr);
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait]
impl Connector for TcpAcceptor {
    async fn establish(&self) -> anyhow::Result<Conduit> {
        let (stream, _) = self.listener.accept().await.context("accept")?;
        stream.set_nodelay(true)?;
        Ok(Conduit::from_tcp(stream))
    }

    fn mode(&self) -> LinkMode {
        LinkMode::Server
    }

    fn retry_delay(&self, config: &LinkConfig) -> Duration {
        config.accept_retry()
    }
}

/// Connects toward a fixed target address.
pub struct TcpInitiator {
    target: String,
}

impl TcpInitiator {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

#[async_trait]
impl Connector for TcpInitiator {
    async fn establish(&self) -> anyhow::Result<Conduit> {
        let stream = TcpStream::connect(self.target.as_str())
            .await
            .with_context(|| format!("connect to {}", self.target))?;
        stream.set_nodelay(true)?;
        Ok(Conduit::from_tcp(stream))
    }

    fn mode(&self) -> LinkMode {
        LinkMode::Client
    }

    fn retry_delay(&self, config: &LinkConfig) -> Duration {
        config.connect_retry()
    }
}

enum Outbound {
    Frame(String),
    Close,
}

enum ConnectionEnd {
    Lost,
    Closed,
}

/// State for one open..close span.
struct Generation {
    shared: Arc<SharedStatus>,
    outbound: mpsc::UnboundedSender<Outbound>,
    inbound: mpsc::UnboundedReceiver<Envelope>,
    task: JoinHandle<()>,
}

/// A [`Transport`] over any [`Connector`]. Must be created inside a tokio
/// runtime; the session loop itself stays synchronous.
pub struct Link {
    connector: Arc<dyn Connector>,
    config: LinkConfig,
    codec: Arc<Codec>,
    runtime: Handle,
    generation: Option<Generation>,
}

impl Link {
    pub fn new(connector: Arc<dyn Connector>, config: LinkConfig) -> anyhow::Result<Self> {
        let runtime = Handle::try_current().context("link requires a tokio runtime")?;
        Ok(Self {
            connector,
            config,
            codec: Arc::new(Codec::new()),
            runtime,
            generation: None,
        })
    }

    /// Sequence number the next frame will carry.
    pub fn next_seq(&self) -> u64 {
        self.codec.peek_seq()
    }
}

impl Transport for Link {
    fn open(&mut self) {
        self.close();
        let shared = Arc::new(SharedStatus::new());
        shared.set_status(LinkStatus::Connecting);
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let task = self.runtime.spawn(supervise(
            self.connector.clone(),
            self.config.clone(),
            shared.clone(),
            outbound_rx,
            inbound_tx,
        ));
        self.generation = Some(Generation {
            shared,
            outbound,
            inbound,
            task,
        });
    }

    fn close(&mut self) {
        let Some(generation) = self.generation.take() else {
            return;
        };
        let _ = generation.outbound.send(Outbound::Close);
        let grace = self.config.close_grace();
        let mut task = generation.task;
        self.runtime.spawn(async move {
            if tokio::time::timeout(grace, &mut task).await.is_err() {
                debug!("link did not close within {:?}; aborting", grace);
                task.abort();
            }
        });
    }

    fn send(&mut self, message: Message) -> Option<u64> {
        let generation = self.generation.as_ref()?;
        if generation.shared.status() != LinkStatus::Connected {
            debug!("link down; dropping {}", message.kind());
            return None;
        }
        match self.codec.encode(message) {
            Ok((seq, frame)) => {
                trace!("-> {}", frame.trim_end());
                generation.outbound.send(Outbound::Frame(frame)).ok()?;
                Some(seq)
            }
            Err(e) => {
                warn!("could not encode {}: {}", message.kind(), e);
                None
            }
        }
    }

    fn try_receive(&mut self) -> Option<Envelope> {
        self.generation.as_mut()?.inbound.try_recv().ok()
    }

    fn status(&self) -> LinkStatus {
        self.generation
            .as_ref()
            .map_or(LinkStatus::Disconnected, |g| g.shared.status())
    }

    fn mode(&self) -> LinkMode {
        self.generation
            .as_ref()
            .map_or(LinkMode::None, |g| g.shared.mode())
    }

    fn take_event(&mut self) -> Option<LinkEvent> {
        self.generation.as_ref()?.shared.take_event()
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        if let Some(generation) = self.generation.take() {
            generation.task.abort();
        }
    }
}

/// Returns `true` if the session closed the link while waiting.
async fn pause(outbound: &mut mpsc::UnboundedReceiver<Outbound>, delay: Duration) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            cmd = outbound.recv() => match cmd {
                Some(Outbound::Frame(_)) => trace!("link down; frame dropped"),
                Some(Outbound::Close) | None => return true,
            },
        }
    }
}

async fn supervise(
    connector: Arc<dyn Connector>,
    config: LinkConfig,
    shared: Arc<SharedStatus>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    inbound: mpsc::UnboundedSender<Envelope>,
) {
    loop {
        shared.set_status(LinkStatus::Connecting);
        let mut attempt = connector.establish();
        let established = loop {
            tokio::select! {
                res = &mut attempt => break res,
                cmd = outbound.recv() => match cmd {
                    Some(Outbound::Frame(_)) => trace!("link down; frame dropped"),
                    Some(Outbound::Close) | None => {
                        shared.set_status(LinkStatus::Disconnected);
                        return;
                    }
                },
            }
        };
        drop(attempt);

        let conduit = match established {
            Ok(conduit) => conduit,
            Err(e) => {
                let delay = connector.retry_delay(&config);
                warn!("link attempt failed: {:#}; retrying in {:?}", e, delay);
                shared.set_status(LinkStatus::Disconnected);
                if pause(&mut outbound, delay).await {
                    return;
                }
                continue;
            }
        };

        info!("link connected to {}", conduit.peer);
        shared.set_mode(connector.mode());
        shared.set_status(LinkStatus::Connected);
        let end = pump(conduit, &mut outbound, &inbound, &shared, config.max_frame_len).await;
        shared.set_status(LinkStatus::Disconnected);
        shared.set_mode(LinkMode::None);
        if let ConnectionEnd::Lost = end {
            info!("link lost");
            shared.mark_lost();
        }
        return;
    }
}

async fn pump(
    conduit: Conduit,
    outbound: &mut mpsc::UnboundedReceiver<Outbound>,
    inbound: &mpsc::UnboundedSender<Envelope>,
    shared: &SharedStatus,
    max_frame_len: usize,
) -> ConnectionEnd {
    let Conduit {
        mut reader,
        mut writer,
        peer,
    } = conduit;

    let read_loop = async {
        let mut frames = FrameBuffer::new(max_frame_len);
        let mut chunk = [0u8; 1024];
        loop {
            let n = match reader.read(&mut chunk).await {
                Ok(0) => {
                    debug!("{} closed the connection", peer);
                    return;
                }
                Ok(n) => n,
                Err(e) => {
                    warn!("read from {} failed: {}", peer, e);
                    return;
                }
            };
            for frame in frames.push(&chunk[..n]) {
                match frame.and_then(|f| Codec::decode(&f)) {
                    Ok(env) if env.message == Message::Disconnect => {
                        info!("{} sent DISCONNECT", peer);
                        shared.mark_peer_quit();
                    }
                    Ok(env) => {
                        trace!("<- {} seq {}", env.message.kind(), env.seq);
                        if inbound.send(env).is_err() {
                            return;
                        }
                    }
                    Err(e) => debug!("discarding frame from {}: {}", peer, e),
                }
            }
        }
    };

    let write_loop = async {
        while let Some(cmd) = outbound.recv().await {
            match cmd {
                Outbound::Frame(frame) => {
                    if let Err(e) = writer.write_all(frame.as_bytes()).await {
                        warn!("write to {} failed: {}", peer, e);
                        return ConnectionEnd::Lost;
                    }
                }
                Outbound::Close => break,
            }
        }
        let _ = writer.flush().await;
        let _ = writer.shutdown().await;
        ConnectionEnd::Closed
    };

    tokio::select! {
        _ = read_loop => ConnectionEnd::Lost,
        end = write_loop => end,
    }
}
