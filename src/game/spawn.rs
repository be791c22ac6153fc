//! Spawn point selection

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::Vec2;

/// Errors from spawn selection setup
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    /// Fatal: a match must never start without placement candidates,
    /// otherwise players would materialize at the origin with no collision
    /// safety.
    #[error("no spawn points configured")]
    NoSpawnPointsConfigured,
}

/// Picks spawn locations uniformly at random from the configured list
#[derive(Debug)]
pub struct SpawnSelector {
    points: Vec<Vec2>,
    rng: ChaCha8Rng,
}

impl SpawnSelector {
    /// Build a selector over a non-empty spawn point list
    pub fn new(points: Vec<Vec2>, seed: u64) -> Result<Self, SpawnError> {
        if points.is_empty() {
            return Err(SpawnError::NoSpawnPointsConfigured);
        }
        Ok(Self {
            points,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// Choose one spawn location
    pub fn choose(&mut self) -> Vec2 {
        let index = self.rng.gen_range(0..self.points.len());
        self.points[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_spawn_list_is_rejected() {
        assert!(matches!(
            SpawnSelector::new(Vec::new(), 1),
            Err(SpawnError::NoSpawnPointsConfigured)
        ));
    }

    #[test]
    fn chooses_only_configured_points() {
        let points = vec![Vec2::new(-3.0, 0.0), Vec2::new(0.0, 2.0), Vec2::new(3.0, 0.0)];
        let mut selector = SpawnSelector::new(points.clone(), 42).unwrap();
        for _ in 0..100 {
            let chosen = selector.choose();
            assert!(points.contains(&chosen));
        }
    }

    #[test]
    fn selection_covers_the_whole_list() {
        let points = vec![Vec2::new(-3.0, 0.0), Vec2::new(0.0, 2.0), Vec2::new(3.0, 0.0)];
        let mut selector = SpawnSelector::new(points.clone(), 7).unwrap();
        let mut seen = [false; 3];
        for _ in 0..200 {
            let chosen = selector.choose();
            let idx = points.iter().position(|p| *p == chosen).unwrap();
            seen[idx] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn same_seed_gives_same_sequence() {
        let points = vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0)];
        let mut a = SpawnSelector::new(points.clone(), 99).unwrap();
        let mut b = SpawnSelector::new(points, 99).unwrap();
        for _ in 0..20 {
            assert_eq!(a.choose(), b.choose());
        }
    }
}
