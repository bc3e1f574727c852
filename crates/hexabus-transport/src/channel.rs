//! Multicast channel
//!
//! One tokio task owns the socket. Every cycle it flushes one request from
//! each registered handler, then receives until a handler reports more work,
//! the receive times out, or the registry is woken. I/O errors drop the
//! socket and the loop reopens it after a capped, doubling delay.

use hexabus_core::{Codec, HexDump};
use parking_lot::{Mutex, RwLock};
use socket2::{Domain, Protocol, Socket, Type};
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::config::ChannelConfig;
use crate::error::{Result, TransportError};
use crate::listeners::ListenerRegistry;
use crate::traits::PacketHandler;

/// Shared UDP endpoint for every device session
pub struct MulticastChannel {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    config: ChannelConfig,
    codec: Codec,
    listeners: Arc<ListenerRegistry>,
    fallback: Arc<dyn PacketHandler>,
    running: AtomicBool,
    shutdown: watch::Sender<bool>,
    local_addr: RwLock<Option<SocketAddr>>,
}

/// What ended a single receive
enum Received {
    Stop,
    Flush,
    Datagram(io::Result<(usize, SocketAddr)>),
}

impl MulticastChannel {
    /// Create a channel. Packets from remotes without a registered listener
    /// go to `fallback`.
    pub fn new(config: ChannelConfig, fallback: Arc<dyn PacketHandler>) -> Result<Self> {
        Self::with_codec(config, Codec::new(), fallback)
    }

    pub fn with_codec(
        config: ChannelConfig,
        codec: Codec,
        fallback: Arc<dyn PacketHandler>,
    ) -> Result<Self> {
        config.validate()?;
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                codec,
                listeners: Arc::new(ListenerRegistry::new()),
                fallback,
                running: AtomicBool::new(false),
                shutdown,
                local_addr: RwLock::new(None),
            }),
            task: Mutex::new(None),
        })
    }

    /// Start the loop task on the current tokio runtime
    pub fn open(&self) -> Result<()> {
        let runtime = Handle::try_current().map_err(|_| TransportError::NoRuntime)?;

        let mut task = self.task.lock();
        if task.is_some() {
            return Err(TransportError::AlreadyOpen);
        }

        self.shared.running.store(true, Ordering::SeqCst);
        self.shared.shutdown.send_replace(false);

        let shared = Arc::clone(&self.shared);
        let shutdown = self.shared.shutdown.subscribe();
        *task = Some(runtime.spawn(shared.run(shutdown)));

        info!("Hexabus channel opening on {}", self.shared.config.bind);
        Ok(())
    }

    /// Stop the loop and wait for it to release the socket.
    ///
    /// Requests still queued or in flight are abandoned.
    pub async fn close(&self) -> Result<()> {
        let handle = self.task.lock().take().ok_or(TransportError::NotOpen)?;

        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.shutdown.send_replace(true);

        handle
            .await
            .map_err(|e| TransportError::Task(e.to_string()))?;

        info!("Hexabus channel closed");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Address the socket is bound to, once the loop has opened it
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.shared.local_addr.read()
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.shared.config
    }

    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.shared.listeners
    }

    pub fn register_listener(&self, addr: SocketAddr, handler: Arc<dyn PacketHandler>) -> bool {
        self.shared.listeners.register(addr, handler)
    }

    pub fn remove_listener(&self, addr: &SocketAddr, handler: &Arc<dyn PacketHandler>) -> bool {
        self.shared.listeners.remove(addr, handler)
    }
}

impl Drop for MulticastChannel {
    fn drop(&mut self) {
        if self.task.get_mut().is_some() {
            self.shared.running.store(false, Ordering::SeqCst);
            self.shared.shutdown.send_replace(true);
        }
    }
}

impl fmt::Debug for MulticastChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MulticastChannel")
            .field("bind", &self.shared.config.bind)
            .field("local_addr", &self.local_addr())
            .field("running", &self.is_running())
            .field("listeners", &self.shared.listeners.len())
            .finish()
    }
}

impl Shared {
    async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut retry = self.config.retry_initial();
        let mut buf = vec![0u8; self.config.max_packet_size];

        while self.running.load(Ordering::SeqCst) {
            let socket = match open_socket(&self.config) {
                Ok(socket) => {
                    retry = self.config.retry_initial();
                    socket
                }
                Err(e) => {
                    warn!(
                        "Failed to open socket on {}: {}, retrying in {:?}",
                        self.config.bind, e, retry
                    );
                    if self.pause(retry, &mut shutdown).await {
                        break;
                    }
                    retry = self.config.next_retry(retry);
                    continue;
                }
            };

            let local = socket.local_addr().ok();
            *self.local_addr.write() = local;
            debug!("Socket open on {:?}", local);

            match self.serve(&socket, &mut buf, &mut shutdown).await {
                Ok(()) => break,
                Err(e) => {
                    error!("Socket error on {:?}: {}", local, e);
                    *self.local_addr.write() = None;
                    drop(socket);
                    if self.pause(retry, &mut shutdown).await {
                        break;
                    }
                }
            }
        }

        *self.local_addr.write() = None;
        debug!("Channel loop exited");
    }

    /// Sleep for `delay`; true if the channel was closed meanwhile
    async fn pause(&self, delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = stopped(shutdown) => true,
            _ = tokio::time::sleep(delay) => false,
        }
    }

    /// Flush/receive cycles until shutdown (`Ok`) or a socket error
    async fn serve(
        &self,
        socket: &UdpSocket,
        buf: &mut [u8],
        shutdown: &mut watch::Receiver<bool>,
    ) -> io::Result<()> {
        loop {
            self.flush(socket).await?;

            loop {
                let received = tokio::select! {
                    biased;
                    _ = stopped(shutdown) => Received::Stop,
                    _ = self.listeners.woken() => Received::Flush,
                    r = tokio::time::timeout(self.config.recv_timeout(), socket.recv_from(buf)) => {
                        match r {
                            Ok(datagram) => Received::Datagram(datagram),
                            Err(_) => Received::Flush,
                        }
                    }
                };

                match received {
                    Received::Stop => return Ok(()),
                    Received::Flush => break,
                    Received::Datagram(datagram) => {
                        let (len, from) = datagram?;
                        if self.dispatch(&buf[..len], from) {
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn flush(&self, socket: &UdpSocket) -> io::Result<()> {
        for packet in self.listeners.pending_requests() {
            match self.codec.encode(&packet) {
                Ok(frame) => {
                    trace!("Sending {} to {}", packet, packet.remote);
                    socket.send_to(&frame, packet.remote).await?;
                }
                Err(e) => warn!("Dropping unencodable request {}: {}", packet, e),
            }
        }
        Ok(())
    }

    /// Decode and route one datagram; true if the handler has more to send
    fn dispatch(&self, datagram: &[u8], from: SocketAddr) -> bool {
        let Some(packet) = self.codec.decode(from, datagram) else {
            trace!("Dropped datagram from {}: {}", from, HexDump(datagram));
            return false;
        };

        match self.listeners.get(&from) {
            Some(handler) => {
                trace!("Routing {} to listener", packet);
                handler.handle_packet(packet, &self.listeners)
            }
            None => {
                trace!("Routing {} to fallback", packet);
                self.fallback.handle_packet(packet, &self.listeners)
            }
        }
    }
}

/// Resolves once the channel is asked to stop. A dropped sender counts.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

fn open_socket(config: &ChannelConfig) -> io::Result<UdpSocket> {
    let socket = Socket::new(
        Domain::for_address(config.bind),
        Type::DGRAM,
        Some(Protocol::UDP),
    )?;
    socket.set_reuse_address(true)?;
    socket.bind(&config.bind.into())?;

    if let Some(group) = config.multicast_group {
        socket.join_multicast_v6(&group, config.interface)?;
        debug!("Joined {} on interface {}", group, config.interface);
    }

    socket.set_nonblocking(true)?;
    UdpSocket::from_std(socket.into())
}
