//! Typed events published on the event bus.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// Chat channel a message was sent on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChatChannel {
    ChatAll,
    ChatTeam,
    ChatSquad,
    ChatAdmin,
}

impl ChatChannel {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ChatAll" => Some(ChatChannel::ChatAll),
            "ChatTeam" => Some(ChatChannel::ChatTeam),
            "ChatSquad" => Some(ChatChannel::ChatSquad),
            "ChatAdmin" => Some(ChatChannel::ChatAdmin),
            _ => None,
        }
    }
}

/// A player currently on the server, as listed by `ListPlayers`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub eos_id: String,
    pub steam_id: Option<String>,
    pub name: String,
    pub team_id: Option<String>,
    pub squad_id: Option<String>,
    pub is_leader: bool,
    pub role: String,
}

/// A recently disconnected player, as listed by `ListPlayers`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectedPlayer {
    pub id: String,
    pub eos_id: String,
    pub steam_id: Option<String>,
    pub since_disconnect: String,
    pub name: String,
}

/// Both sections of a `ListPlayers` response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerList {
    pub online: Vec<Player>,
    pub disconnected: Vec<DisconnectedPlayer>,
}

/// A squad, as listed by `ListSquads`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Squad {
    pub id: String,
    pub team_id: String,
    pub team_name: String,
    pub name: String,
    pub size: u32,
    pub locked: bool,
    pub creator_name: String,
    pub creator_eos_id: String,
    pub creator_steam_id: Option<String>,
}

/// Event delivered to subscribers
///
/// Every line-derived variant keeps the original line in `raw`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypedEvent {
    ChatMessage {
        channel: ChatChannel,
        eos_id: String,
        steam_id: Option<String>,
        player_name: String,
        message: String,
        raw: String,
    },
    /// Chat message starting with `!`
    CommandMessage {
        channel: ChatChannel,
        eos_id: String,
        steam_id: Option<String>,
        player_name: String,
        command: String,
        args: String,
        raw: String,
    },
    PlayerWarned {
        player_name: String,
        reason: String,
        raw: String,
    },
    PlayerKicked {
        player_id: String,
        eos_id: String,
        steam_id: Option<String>,
        player_name: String,
        raw: String,
    },
    PlayerBanned {
        player_id: String,
        eos_id: String,
        steam_id: Option<String>,
        player_name: String,
        interval: String,
        raw: String,
    },
    AdminCameraPossessed {
        eos_id: String,
        steam_id: Option<String>,
        admin_name: String,
        raw: String,
    },
    AdminCameraUnpossessed {
        eos_id: String,
        steam_id: Option<String>,
        admin_name: String,
        raw: String,
    },
    SquadCreated {
        player_name: String,
        eos_id: String,
        steam_id: Option<String>,
        squad_id: String,
        squad_name: String,
        team_name: String,
        raw: String,
    },
    ListPlayers {
        players: PlayerList,
        raw: String,
    },
    ListSquads {
        squads: Vec<Squad>,
        raw: String,
    },
    /// Line that matched no known shape
    RawData {
        body: String,
    },
    /// Session reached `Ready`
    Connected,
    Disconnected {
        reason: String,
    },
    /// Socket or protocol error observed by the session
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl TypedEvent {
    /// Stable name of the variant, used for logging and routing
    pub fn name(&self) -> &'static str {
        match self {
            TypedEvent::ChatMessage { .. } => "CHAT_MESSAGE",
            TypedEvent::CommandMessage { .. } => "COMMAND_MESSAGE",
            TypedEvent::PlayerWarned { .. } => "PLAYER_WARNED",
            TypedEvent::PlayerKicked { .. } => "PLAYER_KICKED",
            TypedEvent::PlayerBanned { .. } => "PLAYER_BANNED",
            TypedEvent::AdminCameraPossessed { .. } => "POSSESSED_ADMIN_CAMERA",
            TypedEvent::AdminCameraUnpossessed { .. } => "UNPOSSESSED_ADMIN_CAMERA",
            TypedEvent::SquadCreated { .. } => "SQUAD_CREATED",
            TypedEvent::ListPlayers { .. } => "LIST_PLAYERS",
            TypedEvent::ListSquads { .. } => "LIST_SQUADS",
            TypedEvent::RawData { .. } => "DATA",
            TypedEvent::Connected => "CONNECTED",
            TypedEvent::Disconnected { .. } => "DISCONNECTED",
            TypedEvent::Error { .. } => "ERROR",
        }
    }

    /// Original text this event was built from, if any
    pub fn raw(&self) -> Option<&str> {
        match self {
            TypedEvent::ChatMessage { raw, .. }
            | TypedEvent::CommandMessage { raw, .. }
            | TypedEvent::PlayerWarned { raw, .. }
            | TypedEvent::PlayerKicked { raw, .. }
            | TypedEvent::PlayerBanned { raw, .. }
            | TypedEvent::AdminCameraPossessed { raw, .. }
            | TypedEvent::AdminCameraUnpossessed { raw, .. }
            | TypedEvent::SquadCreated { raw, .. }
            | TypedEvent::ListPlayers { raw, .. }
            | TypedEvent::ListSquads { raw, .. } => Some(raw),
            TypedEvent::RawData { body } => Some(body),
            TypedEvent::Connected | TypedEvent::Disconnected { .. } | TypedEvent::Error { .. } => {
                None
            }
        }
    }
}
