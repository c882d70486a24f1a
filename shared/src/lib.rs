use serde::{Deserialize, Serialize};
use std::fmt;

pub const PROTOCOL_VERSION: u32 = 340;
pub const DEFAULT_PORT: u16 = 25565;
/// Fixed cadence at which the server expects position updates.
pub const TICK_INTERVAL_MS: u64 = 50;
pub const MAX_PACKET_SIZE: usize = 2048;

/// Every packet the client can send or receive.
///
/// Serverbound variants travel client -> server, clientbound variants
/// travel server -> client. The set is closed on purpose so listeners can
/// be keyed on [`PacketKind`].
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    // Serverbound
    LoginStart {
        protocol_version: u32,
        username: String,
        access_token: Option<String>,
    },
    PlayerPosition {
        x: f64,
        feet_y: f64,
        z: f64,
        on_ground: bool,
    },
    ClientStatus {
        action: ClientStatusAction,
    },
    Chat {
        message: String,
    },
    KeepAliveResponse {
        keep_alive_id: u64,
    },
    TeleportConfirm {
        teleport_id: i32,
    },

    // Clientbound
    LoginSuccess {
        uuid: String,
        username: String,
    },
    JoinGame {
        entity_id: i32,
        game_mode: u8,
        dimension: i32,
    },
    PlayerPositionAndLook {
        x: f64,
        y: f64,
        z: f64,
        yaw: f32,
        pitch: f32,
        flags: u8,
        teleport_id: i32,
    },
    ChatMessage {
        json_data: String,
        position: ChatPosition,
    },
    KeepAlive {
        keep_alive_id: u64,
    },
    Disconnect {
        reason: String,
    },
}

/// Fieldless discriminant of [`Packet`], used as a registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    LoginStart,
    PlayerPosition,
    ClientStatus,
    Chat,
    KeepAliveResponse,
    TeleportConfirm,
    LoginSuccess,
    JoinGame,
    PlayerPositionAndLook,
    ChatMessage,
    KeepAlive,
    Disconnect,
}

impl Packet {
    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::LoginStart { .. } => PacketKind::LoginStart,
            Packet::PlayerPosition { .. } => PacketKind::PlayerPosition,
            Packet::ClientStatus { .. } => PacketKind::ClientStatus,
            Packet::Chat { .. } => PacketKind::Chat,
            Packet::KeepAliveResponse { .. } => PacketKind::KeepAliveResponse,
            Packet::TeleportConfirm { .. } => PacketKind::TeleportConfirm,
            Packet::LoginSuccess { .. } => PacketKind::LoginSuccess,
            Packet::JoinGame { .. } => PacketKind::JoinGame,
            Packet::PlayerPositionAndLook { .. } => PacketKind::PlayerPositionAndLook,
            Packet::ChatMessage { .. } => PacketKind::ChatMessage,
            Packet::KeepAlive { .. } => PacketKind::KeepAlive,
            Packet::Disconnect { .. } => PacketKind::Disconnect,
        }
    }

    /// Direction this packet travels as seen from the client.
    pub fn direction(&self) -> Direction {
        self.kind().direction()
    }
}

impl PacketKind {
    pub fn direction(self) -> Direction {
        match self {
            PacketKind::LoginStart
            | PacketKind::PlayerPosition
            | PacketKind::ClientStatus
            | PacketKind::Chat
            | PacketKind::KeepAliveResponse
            | PacketKind::TeleportConfirm => Direction::Outbound,
            PacketKind::LoginSuccess
            | PacketKind::JoinGame
            | PacketKind::PlayerPositionAndLook
            | PacketKind::ChatMessage
            | PacketKind::KeepAlive
            | PacketKind::Disconnect => Direction::Inbound,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Action carried by a serverbound client status packet.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ClientStatusAction {
    Respawn,
    RequestStats,
}

impl ClientStatusAction {
    /// Wire action code.
    pub fn code(self) -> u8 {
        match self {
            ClientStatusAction::Respawn => 0,
            ClientStatusAction::RequestStats => 1,
        }
    }
}

/// Where the server wants a chat message shown.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ChatPosition {
    Chat,
    System,
    GameInfo,
}

impl fmt::Display for ChatPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChatPosition::Chat => "CHAT",
            ChatPosition::System => "SYSTEM",
            ChatPosition::GameInfo => "GAME_INFO",
        };
        f.write_str(name)
    }
}
