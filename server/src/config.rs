use crate::error::ConfigError;
use crate::level::LevelDescription;
use speedball_shared::HEARTBEAT_INTERVAL;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Roster capacity, one client per team.
    pub max_players: usize,
    /// Steps per second. Every step simulates `1 / tick_rate` seconds.
    pub tick_rate: u32,
    /// Seconds between heartbeat probes.
    pub heartbeat_interval: f64,
    /// Unanswered probe intervals after which a client is dropped.
    pub heartbeat_timeout_intervals: Option<u32>,
    /// Goals that end the match.
    pub score_limit: Option<u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_players: 2,
            tick_rate: 30,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            heartbeat_timeout_intervals: Some(10),
            score_limit: None,
        }
    }
}

impl ServerConfig {
    /// Fixed simulation delta of one step, in seconds.
    pub fn update_delta(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    pub fn validate(&self, level: &LevelDescription) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        if !(self.heartbeat_interval > 0.0) {
            return Err(ConfigError::HeartbeatInterval(self.heartbeat_interval));
        }
        if self.max_players != level.teams.len() {
            return Err(ConfigError::TeamMismatch {
                max_players: self.max_players,
                teams: level.teams.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_default_config_fits_testing_level() {
        let config = ServerConfig::default();
        assert_eq!(config.validate(&LevelDescription::testing()), Ok(()));
        assert_approx_eq!(config.update_delta(), 1.0 / 30.0);
    }

    #[test]
    fn test_invalid_configs() {
        let level = LevelDescription::testing();

        let config = ServerConfig {
            tick_rate: 0,
            ..ServerConfig::default()
        };
        assert_eq!(config.validate(&level), Err(ConfigError::ZeroTickRate));

        let config = ServerConfig {
            heartbeat_interval: 0.0,
            ..ServerConfig::default()
        };
        assert_eq!(
            config.validate(&level),
            Err(ConfigError::HeartbeatInterval(0.0))
        );

        let config = ServerConfig {
            max_players: 3,
            ..ServerConfig::default()
        };
        assert_eq!(
            config.validate(&level),
            Err(ConfigError::TeamMismatch {
                max_players: 3,
                teams: 2
            })
        );
    }
}
