//! Wire protocol shared by the SpeedBall server and its clients.
//!
//! Every datagram carries exactly one bincode-encoded [`Packet`]. The enum
//! discriminant plays the role of the command byte, and [`PlayerInput`]'s
//! discriminant is the input kind. Datagrams that fail to decode (truncated
//! payloads, unknown commands or input kinds) are rejected by [`decode`] and
//! dropped by the receiver.

use serde::{Deserialize, Serialize};

/// Seconds between two heartbeat probes sent to the same client.
pub const HEARTBEAT_INTERVAL: f64 = 1.0;
/// Last/mean round-trip value reported before any probe was acknowledged.
pub const UNKNOWN_RTT: f64 = -1.0;
/// Distance the ball is moved along the shot direction so it clears the kicker.
pub const SHOT_OFFSET: f32 = 3.0;
/// Entity id reported for a client or team that controls nothing.
pub const NO_ENTITY: u32 = 0;

/// Cheat-score added for out-of-context or stale commands.
pub const MALUS_MINOR: u32 = 1;
/// Cheat-score added for commands targeting the wrong kind of entity or
/// forging authoritative positions.
pub const MALUS_SEVERE: u32 = 10;

/// Lifecycle of the single match hosted by a server.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchState {
    WaitingForPlayers,
    ResettingPlayersPositions,
    Playing,
    Ended,
}

impl MatchState {
    /// True while gameplay is running, including the transient reset.
    pub fn is_in_play(&self) -> bool {
        matches!(
            self,
            MatchState::Playing | MatchState::ResettingPlayersPositions
        )
    }
}

/// Kinds of world entities announced to clients through `Spawn`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Player,
    Ball,
    Obstacle,
    Net,
}

/// Gameplay commands a client can issue for the team it owns.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum PlayerInput {
    SelectPlayer { target: u32 },
    Movement { x: f32, y: f32 },
    Shot { dir_x: f32, dir_y: f32, force: f32 },
    Tackle,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    // Client -> server
    Join,
    Leave,
    Input {
        input: PlayerInput,
    },
    ClientUpdate {
        entity_id: u32,
        x: f32,
        y: f32,
    },

    // Both directions
    Ping {
        probe_id: u32,
    },
    Pong {
        probe_id: u32,
    },

    // Server -> client
    Welcome {
        team_id: u32,
        controlled_player_id: u32,
    },
    Spawn {
        entity_id: u32,
        kind: EntityKind,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        team_id: Option<u32>,
        owned: bool,
    },
    GameInfo {
        scores: Vec<u32>,
        controlled_players: Vec<u32>,
        state: MatchState,
    },
    EntityUpdate {
        entity_id: u32,
        x: f32,
        y: f32,
    },
}

impl Packet {
    /// Short name used in log lines.
    pub fn command_name(&self) -> &'static str {
        match self {
            Packet::Join => "join",
            Packet::Leave => "leave",
            Packet::Input { .. } => "input",
            Packet::ClientUpdate { .. } => "client_update",
            Packet::Ping { .. } => "ping",
            Packet::Pong { .. } => "pong",
            Packet::Welcome { .. } => "welcome",
            Packet::Spawn { .. } => "spawn",
            Packet::GameInfo { .. } => "game_info",
            Packet::EntityUpdate { .. } => "entity_update",
        }
    }
}

pub fn encode(packet: &Packet) -> Result<Vec<u8>, bincode::Error> {
    bincode::serialize(packet)
}

pub fn decode(data: &[u8]) -> Result<Packet, bincode::Error> {
    bincode::deserialize(data)
}
