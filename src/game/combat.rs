//! Combat system - damage adjudication and projectile tagging

use super::roster::Roster;
use super::{PlayerId, Vec2};

/// Damage dealt per projectile hit
pub const HIT_DAMAGE: u8 = 1;

/// Shooter-tagged projectile description.
/// The physics collaborator owns the live entity; the core only records who
/// fired it and where it was aimed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projectile {
    pub shooter: PlayerId,
    pub direction: Vec2,
}

impl Projectile {
    pub fn new(shooter: PlayerId, direction: Vec2) -> Self {
        Self { shooter, direction }
    }
}

/// Result of resolving a projectile-vs-player collision.
/// The projectile is consumed by the caller in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    /// Victim lost health and survived
    Damaged { remaining: u8 },
    /// Victim's health reached zero; a kill is attributed to the shooter
    Killed,
    /// A projectile cannot hurt its own shooter
    SelfHitIgnored,
    /// The victim left the match before the projectile landed
    VictimMissing,
}

/// Resolve a hit against the roster, decrementing the victim's health.
/// Health never drops below zero, so a single hit produces at most one kill.
pub fn resolve_hit(roster: &mut Roster, shooter: PlayerId, victim: PlayerId) -> HitOutcome {
    if shooter == victim {
        return HitOutcome::SelfHitIgnored;
    }

    let Some(record) = roster.get_mut(victim) else {
        return HitOutcome::VictimMissing;
    };

    record.health = record.health.saturating_sub(HIT_DAMAGE);
    if record.health == 0 {
        HitOutcome::Killed
    } else {
        HitOutcome::Damaged {
            remaining: record.health,
        }
    }
}
