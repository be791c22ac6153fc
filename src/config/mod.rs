//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::game::Vec2;

/// Gameplay rules, all overridable through the environment
#[derive(Clone, Debug)]
pub struct MatchRules {
    /// Hard cap on admitted players
    pub max_players: usize,
    /// Minimum roster size required to leave the lobby
    pub min_players: usize,
    /// Kill count that ends the match
    pub win_threshold: u32,
    /// Seconds counted down in the waiting phase
    pub countdown_seconds: u32,
    /// Seconds between winner announcement and the rematch reset
    pub finish_delay_seconds: u64,
    /// Health a player holds at spawn (6 = three full hearts)
    pub starting_health: u8,
    /// Number of selectable character loadouts
    pub loadout_count: u8,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            max_players: 4,
            min_players: 2,
            win_threshold: 3,
            countdown_seconds: 10,
            finish_delay_seconds: 5,
            starting_health: 6,
            loadout_count: 5,
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origin for CORS
    pub client_origin: String,
    /// Gameplay rules
    pub rules: MatchRules,
    /// Spawn points players can be placed at; must not be empty
    pub spawn_points: Vec<Vec2>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Render-style PORT takes precedence, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let rules = MatchRules {
            max_players: env_parse("ARENA_MAX_PLAYERS", 4)?,
            min_players: env_parse("ARENA_MIN_PLAYERS", 2)?,
            win_threshold: env_parse("ARENA_WIN_THRESHOLD", 3)?,
            countdown_seconds: env_parse("ARENA_COUNTDOWN_SECONDS", 10)?,
            finish_delay_seconds: env_parse("ARENA_FINISH_DELAY_SECONDS", 5)?,
            starting_health: env_parse("ARENA_STARTING_HEALTH", 6)?,
            loadout_count: env_parse("ARENA_LOADOUT_COUNT", 5)?,
        };

        let spawn_points = parse_spawn_points(
            &env::var("ARENA_SPAWN_POINTS")
                .unwrap_or_else(|_| DEFAULT_SPAWN_POINTS.to_string()),
        )?;

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "*".to_string()),
            rules,
            spawn_points,
        })
    }
}

/// Spawn layout used when ARENA_SPAWN_POINTS is unset
const DEFAULT_SPAWN_POINTS: &str = "-6.0,-2.5;-3.0,1.0;0.0,3.5;3.0,1.0;6.0,-2.5";

/// Parse a `x,y;x,y;...` list into spawn points.
/// An empty result is a startup-fatal configuration error: players must never
/// fall back to spawning at the origin.
fn parse_spawn_points(raw: &str) -> Result<Vec<Vec2>, ConfigError> {
    let mut points = Vec::new();
    for entry in raw.split(';').filter(|s| !s.trim().is_empty()) {
        let (x, y) = entry
            .split_once(',')
            .ok_or_else(|| ConfigError::InvalidSpawnPoint(entry.to_string()))?;
        let parse = |s: &str| {
            s.trim()
                .parse::<f32>()
                .map_err(|_| ConfigError::InvalidSpawnPoint(entry.to_string()))
        };
        points.push(Vec2 {
            x: parse(x)?,
            y: parse(y)?,
        });
    }
    if points.is_empty() {
        return Err(ConfigError::NoSpawnPointsConfigured);
    }
    Ok(points)
}

/// Parse an env var with a default, failing on malformed values
fn env_parse<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid spawn point entry: {0}")]
    InvalidSpawnPoint(String),

    #[error("No spawn points configured")]
    NoSpawnPointsConfigured,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_spawn_point_list() {
        let points = parse_spawn_points("1.0,2.0;-3.5,0.25").unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].x, -3.5);
        assert_eq!(points[1].y, 0.25);
    }

    #[test]
    fn empty_spawn_list_is_fatal() {
        assert!(matches!(
            parse_spawn_points("  "),
            Err(ConfigError::NoSpawnPointsConfigured)
        ));
    }

    #[test]
    fn malformed_spawn_entry_is_rejected() {
        assert!(matches!(
            parse_spawn_points("1.0;2.0"),
            Err(ConfigError::InvalidSpawnPoint(_))
        ));
    }

    #[test]
    fn default_rules_match_shipped_tuning() {
        let rules = MatchRules::default();
        assert_eq!(rules.max_players, 4);
        assert_eq!(rules.min_players, 2);
        assert_eq!(rules.win_threshold, 3);
        assert_eq!(rules.starting_health, 6);
    }
}
