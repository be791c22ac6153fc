//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

use crate::game::r#match::MatchPhase;
use crate::game::roster::PlayerSummary;
use crate::game::{PlayerId, Vec2};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Movement intent; integrated by the physics layer
    Move {
        /// Unit-ish direction vector from the input layer
        direction: Vec2,
    },

    /// Jump intent; integrated by the physics layer
    Jump,

    /// Fire a projectile in the given direction
    Fire {
        /// Aim direction
        direction: Vec2,
    },

    /// Select a character loadout
    SetLoadout {
        index: u8,
    },

    /// Set the display name shown above the player
    SetDisplayName {
        name: String,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after admission
    Welcome {
        player_id: PlayerId,
        spawn: Vec2,
        server_time: u64,
        state: MatchPhase,
        /// Everyone in the match at join time, the new player included
        players: Vec<PlayerSummary>,
    },

    /// Match lifecycle transition
    MatchStateChanged {
        state: MatchPhase,
    },

    /// Waiting-phase countdown, seconds remaining
    CountdownTick {
        seconds: u32,
    },

    /// Player admitted to the match
    PlayerJoined {
        player: PlayerSummary,
        spawn: Vec2,
    },

    /// Player left the match
    PlayerLeft {
        player_id: PlayerId,
        display_name: String,
    },

    /// Authoritative health value changed
    HealthChanged {
        player_id: PlayerId,
        health: u8,
    },

    /// Authoritative kill count changed
    KillsChanged {
        player_id: PlayerId,
        kills: u32,
    },

    /// Display name changed
    NameChanged {
        player_id: PlayerId,
        name: String,
    },

    /// Character loadout changed
    LoadoutChanged {
        player_id: PlayerId,
        index: u8,
    },

    /// Atomic respawn: full heal plus a fresh spawn location
    Respawned {
        player_id: PlayerId,
        spawn: Vec2,
        health: u8,
    },

    /// A shooter-tagged projectile was spawned for the physics layer
    ShotFired {
        shooter: PlayerId,
        direction: Vec2,
    },

    /// A player reached the win threshold
    WinnerAnnounced {
        player_id: PlayerId,
        name: String,
    },

    /// Every record was reset and respawned (game entry, rematch, or
    /// forced return to lobby)
    RosterReset {
        players: Vec<SpawnedPlayer>,
    },

    /// Error message
    Error {
        code: String,
        message: String,
    },
}

/// A player summary paired with its freshly selected spawn location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnedPlayer {
    pub player: PlayerSummary,
    pub spawn: Vec2,
}
