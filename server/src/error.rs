use std::net::SocketAddr;
use thiserror::Error;

/// Precondition failures of the match itself.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchError {
    /// Every team already has an owner; callers must check for space first.
    #[error("no free team left for client {0}")]
    RosterFull(SocketAddr),
}

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("failed to read level file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse level description: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid level: {0}")]
    Invalid(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("tick rate must be positive")]
    ZeroTickRate,
    #[error("heartbeat interval must be positive, got {0}")]
    HeartbeatInterval(f64),
    #[error("max players ({max_players}) must match the level's team count ({teams})")]
    TeamMismatch { max_players: usize, teams: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport channel closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Level(#[from] LevelError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}
