//! Arena descriptions consumed once, when the match spawns its world.

use crate::error::LevelError;
use crate::physics::Vector2;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Box-shaped object placed in the arena.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LevelObject {
    pub name: String,
    pub position: Vector2,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpawnPoint {
    pub name: String,
    pub position: Vector2,
}

/// Shared shape and tuning of every player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerInfo {
    pub width: f32,
    pub height: f32,
    #[serde(default = "default_player_speed")]
    pub speed: f32,
    /// Index into each team's spawn list of the player controlled by default.
    #[serde(default)]
    pub default_player_index: usize,
}

fn default_player_speed() -> f32 {
    5.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamLayout {
    pub spawns: Vec<SpawnPoint>,
    #[serde(default)]
    pub net: Option<LevelObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LevelDescription {
    #[serde(default)]
    pub walls: Vec<LevelObject>,
    pub player_info: PlayerInfo,
    pub teams: Vec<TeamLayout>,
    pub ball: LevelObject,
}

impl LevelDescription {
    /// Small built-in arena: one wall, two players for team 0, one for team 1.
    pub fn testing() -> Self {
        let spawn = |name: &str, x: f32, y: f32| SpawnPoint {
            name: name.to_string(),
            position: Vector2::new(x, y),
        };

        Self {
            walls: vec![LevelObject {
                name: "wall".to_string(),
                position: Vector2::new(0.0, 3.0),
                width: 10.0,
                height: 1.0,
            }],
            player_info: PlayerInfo {
                width: 1.0,
                height: 1.0,
                speed: default_player_speed(),
                default_player_index: 0,
            },
            teams: vec![
                TeamLayout {
                    spawns: vec![spawn("home_1", -1.0, 0.0), spawn("home_2", 3.0, 0.0)],
                    net: None,
                },
                TeamLayout {
                    spawns: vec![spawn("away_1", 1.0, 0.0)],
                    net: None,
                },
            ],
            ball: LevelObject {
                name: "ball".to_string(),
                position: Vector2::new(30.0, 30.0),
                width: 1.0,
                height: 1.0,
            },
        }
    }

    pub fn from_json(json: &str) -> Result<Self, LevelError> {
        let level: LevelDescription = serde_json::from_str(json)?;
        level.validate()?;
        Ok(level)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LevelError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), LevelError> {
        if self.teams.is_empty() {
            return Err(LevelError::Invalid("level has no teams".to_string()));
        }

        for (index, team) in self.teams.iter().enumerate() {
            if self.player_info.default_player_index >= team.spawns.len() {
                return Err(LevelError::Invalid(format!(
                    "team {} has {} spawns, default player index is {}",
                    index,
                    team.spawns.len(),
                    self.player_info.default_player_index
                )));
            }
        }

        if self.player_info.width <= 0.0 || self.player_info.height <= 0.0 {
            return Err(LevelError::Invalid("player size must be positive".to_string()));
        }
        Ok(())
    }

    /// Number of entities spawned from this description.
    pub fn entity_count(&self) -> usize {
        let players: usize = self.teams.iter().map(|t| t.spawns.len()).sum();
        let nets = self.teams.iter().filter(|t| t.net.is_some()).count();
        self.walls.len() + players + nets + 1
    }
}
