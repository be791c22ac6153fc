//! Roster - per-player match data owned by the authority

use std::collections::HashMap;

use uuid::Uuid;

use super::PlayerId;

/// A connected player's mutable match data (authoritative)
#[derive(Debug, Clone)]
pub struct PlayerRecord {
    pub id: PlayerId,
    /// Opaque connection token handed to us by the transport
    pub session: Uuid,
    pub display_name: String,
    /// Selected character variant, in 0..loadout_count
    pub loadout: u8,
    pub health: u8,
    pub kills: u32,
}

impl PlayerRecord {
    pub fn new(
        id: PlayerId,
        session: Uuid,
        display_name: String,
        loadout: u8,
        starting_health: u8,
    ) -> Self {
        // Empty names get an authority-assigned default
        let display_name = if display_name.trim().is_empty() {
            format!("player{}", id)
        } else {
            display_name
        };

        Self {
            id,
            session,
            display_name,
            loadout,
            health: starting_health,
            kills: 0,
        }
    }
}

/// Owned snapshot of a record, safe to hand to observers
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PlayerSummary {
    pub id: PlayerId,
    pub display_name: String,
    pub loadout: u8,
    pub health: u8,
    pub kills: u32,
}

impl From<&PlayerRecord> for PlayerSummary {
    fn from(record: &PlayerRecord) -> Self {
        Self {
            id: record.id,
            display_name: record.display_name.clone(),
            loadout: record.loadout,
            health: record.health,
            kills: record.kills,
        }
    }
}

/// Errors from roster mutation
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RosterError {
    #[error("identity {0} already present in roster")]
    DuplicateIdentity(PlayerId),
}

/// Mapping from player identity to authoritative match data.
/// Only the match task mutates this; everyone else sees snapshots.
#[derive(Debug, Default)]
pub struct Roster {
    players: HashMap<PlayerId, PlayerRecord>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record, rejecting duplicate identities
    pub fn insert(&mut self, record: PlayerRecord) -> Result<(), RosterError> {
        if self.players.contains_key(&record.id) {
            return Err(RosterError::DuplicateIdentity(record.id));
        }
        self.players.insert(record.id, record);
        Ok(())
    }

    /// Remove a record; no-op if absent
    pub fn remove(&mut self, id: PlayerId) -> Option<PlayerRecord> {
        self.players.remove(&id)
    }

    pub fn get(&self, id: PlayerId) -> Option<&PlayerRecord> {
        self.players.get(&id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut PlayerRecord> {
        self.players.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// True if the given connection token already owns a record
    pub fn has_session(&self, session: Uuid) -> bool {
        self.players.values().any(|p| p.session == session)
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        self.players.keys().copied().collect()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PlayerRecord> {
        self.players.values_mut()
    }

    /// Snapshot view of every record - owned copies, not a live handle
    pub fn summaries(&self) -> Vec<PlayerSummary> {
        let mut out: Vec<PlayerSummary> = self.players.values().map(PlayerSummary::from).collect();
        out.sort_by_key(|p| p.id);
        out
    }

    /// Display-name projection for UI rendering
    pub fn display_names(&self) -> Vec<(PlayerId, String)> {
        let mut out: Vec<(PlayerId, String)> = self
            .players
            .values()
            .map(|p| (p.id, p.display_name.clone()))
            .collect();
        out.sort_by_key(|&(id, _)| id);
        out
    }
}
