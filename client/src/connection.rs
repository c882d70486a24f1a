//! UDP transport: one bincode-encoded packet per datagram
//!
//! The connection owns two background tasks once connected. The receive task
//! decodes datagrams, answers keep-alives and teleports, and hands every
//! packet to the dispatcher as inbound. The send task drains an unbounded
//! queue so callers never block on the socket; each packet goes out as a
//! single datagram, so sends never interleave.

use crate::auth::AuthenticationToken;
use crate::dispatcher::PacketDispatcher;
use crate::error::ConnectionError;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Direction, Packet, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::sync::Arc;
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::{mpsc, watch};

/// How the client identifies itself to the server.
#[derive(Debug, Clone)]
pub enum Credentials {
    Offline { username: String },
    Online(AuthenticationToken),
}

impl Credentials {
    pub fn username(&self) -> &str {
        match self {
            Credentials::Offline { username } => username,
            Credentials::Online(token) => &token.username,
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        match self {
            Credentials::Offline { .. } => None,
            Credentials::Online(token) => Some(&token.access_token),
        }
    }
}

/// Anything packets can be written to.
pub trait PacketSink: Send + Sync {
    fn write_packet(&self, packet: Packet) -> Result<(), ConnectionError>;
}

impl<T: PacketSink + ?Sized> PacketSink for Arc<T> {
    fn write_packet(&self, packet: Packet) -> Result<(), ConnectionError> {
        (**self).write_packet(packet)
    }
}

/// Cloneable handle onto the connection's outgoing queue.
#[derive(Clone)]
pub struct PacketSender {
    tx: mpsc::UnboundedSender<Packet>,
    dispatcher: Arc<PacketDispatcher>,
}

impl PacketSink for PacketSender {
    fn write_packet(&self, packet: Packet) -> Result<(), ConnectionError> {
        self.dispatcher.dispatch(&packet, Direction::Outbound);
        self.tx.send(packet).map_err(|_| ConnectionError::Closed)
    }
}

type CloseSignal = Arc<watch::Sender<Option<String>>>;

pub struct Connection {
    host: String,
    port: u16,
    credentials: Credentials,
    dispatcher: Arc<PacketDispatcher>,
    sender: Option<PacketSender>,
    closed_tx: CloseSignal,
}

impl Connection {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        credentials: Credentials,
        dispatcher: Arc<PacketDispatcher>,
    ) -> Self {
        let (closed_tx, _) = watch::channel(None);
        Self {
            host: host.into(),
            port,
            credentials,
            dispatcher,
            sender: None,
            closed_tx: Arc::new(closed_tx),
        }
    }

    /// Opens the socket, starts the background tasks and sends the login.
    pub async fn connect(&mut self) -> Result<(), ConnectionError> {
        let addr = lookup_host((self.host.as_str(), self.port))
            .await?
            .next()
            .ok_or_else(|| ConnectionError::Unresolved(self.host.clone()))?;

        let bind_addr = if addr.is_ipv6() { "[::]:0" } else { "0.0.0.0:0" };
        let socket = Arc::new(UdpSocket::bind(bind_addr).await?);
        socket.connect(addr).await?;
        info!("Connecting to {} from {}", addr, socket.local_addr()?);

        let (tx, rx) = mpsc::unbounded_channel();
        let sender = PacketSender {
            tx,
            dispatcher: Arc::clone(&self.dispatcher),
        };

        spawn_network_sender(Arc::clone(&socket), rx, Arc::clone(&self.closed_tx));
        spawn_network_receiver(
            socket,
            Arc::clone(&self.dispatcher),
            sender.clone(),
            Arc::clone(&self.closed_tx),
        );

        sender.write_packet(Packet::LoginStart {
            protocol_version: PROTOCOL_VERSION,
            username: self.credentials.username().to_string(),
            access_token: self.credentials.access_token().map(str::to_string),
        })?;

        self.sender = Some(sender);
        Ok(())
    }

    pub fn sender(&self) -> Result<PacketSender, ConnectionError> {
        self.sender.clone().ok_or(ConnectionError::NotConnected)
    }

    pub fn write_packet(&self, packet: Packet) -> Result<(), ConnectionError> {
        match &self.sender {
            Some(sender) => sender.write_packet(packet),
            None => Err(ConnectionError::NotConnected),
        }
    }

    /// Resolves with the close reason once the transport has shut down.
    pub async fn closed(&self) -> String {
        wait_closed(&self.closed_tx).await
    }
}

async fn wait_closed(closed_tx: &watch::Sender<Option<String>>) -> String {
    let mut closed_rx = closed_tx.subscribe();
    loop {
        let reason = closed_rx.borrow_and_update().clone();
        if let Some(reason) = reason {
            return reason;
        }
        if closed_rx.changed().await.is_err() {
            return "connection dropped".to_string();
        }
    }
}

fn close(closed_tx: &watch::Sender<Option<String>>, reason: String) {
    closed_tx.send_if_modified(|current| {
        if current.is_none() {
            *current = Some(reason);
            true
        } else {
            false
        }
    });
}

/// Packet the transport answers with on its own, before any listener runs.
pub fn protocol_reply(packet: &Packet) -> Option<Packet> {
    match packet {
        Packet::KeepAlive { keep_alive_id } => Some(Packet::KeepAliveResponse {
            keep_alive_id: *keep_alive_id,
        }),
        Packet::PlayerPositionAndLook { teleport_id, .. } => Some(Packet::TeleportConfirm {
            teleport_id: *teleport_id,
        }),
        _ => None,
    }
}

fn spawn_network_sender(
    socket: Arc<UdpSocket>,
    mut rx: mpsc::UnboundedReceiver<Packet>,
    closed_tx: CloseSignal,
) {
    tokio::spawn(async move {
        loop {
            let packet = tokio::select! {
                packet = rx.recv() => match packet {
                    Some(packet) => packet,
                    None => break,
                },
                _ = wait_closed(&closed_tx) => break,
            };

            let data = match serialize(&packet) {
                Ok(data) => data,
                Err(e) => {
                    error!("Failed to encode {:?}: {}", packet.kind(), e);
                    continue;
                }
            };

            if let Err(e) = socket.send(&data).await {
                error!("Failed to send packet: {}", e);
                close(&closed_tx, e.to_string());
                break;
            }
        }
        debug!("Network sender stopped");
    });
}

fn spawn_network_receiver(
    socket: Arc<UdpSocket>,
    dispatcher: Arc<PacketDispatcher>,
    sender: PacketSender,
    closed_tx: CloseSignal,
) {
    tokio::spawn(async move {
        let mut buffer = [0u8; MAX_PACKET_SIZE];

        loop {
            let len = match socket.recv(&mut buffer).await {
                Ok(len) => len,
                Err(e) => {
                    error!("Error receiving packet: {}", e);
                    close(&closed_tx, e.to_string());
                    break;
                }
            };

            let packet = match deserialize::<Packet>(&buffer[..len]) {
                Ok(packet) => packet,
                Err(e) => {
                    warn!("Failed to deserialize packet: {}", e);
                    continue;
                }
            };

            if packet.direction() != Direction::Inbound {
                warn!("Ignoring serverbound {:?} received from server", packet.kind());
                continue;
            }

            if let Some(reply) = protocol_reply(&packet) {
                if sender.write_packet(reply).is_err() {
                    break;
                }
            }

            dispatcher.dispatch(&packet, Direction::Inbound);

            if let Packet::Disconnect { reason } = packet {
                info!("Server closed the connection: {}", reason);
                close(&closed_tx, reason);
                break;
            }
        }
        debug!("Network receiver stopped");
    });
}
