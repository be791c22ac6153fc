//! Match coordination modules

pub mod combat;
pub mod r#match;
pub mod roster;
pub mod spawn;

pub use r#match::{MatchHandle, MatchPhase, MatchTask};
pub use roster::{PlayerRecord, Roster};

use serde::{Deserialize, Serialize};

/// Stable player identity, assigned at admission
pub type PlayerId = u32;

/// 2D vector used for spawn points and aim directions
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}
