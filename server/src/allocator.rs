//! Player identity assignment and spawn point selection
//!
//! Identities are handed out once per login, strictly increasing from 0 and
//! never reused. Spawn points are collected lazily from the level the first
//! time one is needed and are read-only afterwards.

use glam::Vec3;
use log::{info, warn};
use rand::Rng;
use shared::level::{Level, SpawnTag};
use shared::{ExecutionContext, GameError, PlayerId, MAX_PLAYERS};

/// Issues unique player identities for the lifetime of a match
#[derive(Debug, Default)]
pub struct IdentityAllocator {
    next_id: u32,
}

impl IdentityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next identity. Fails once both seats are taken.
    pub fn assign(&mut self, ctx: &ExecutionContext) -> Result<PlayerId, GameError> {
        ctx.require_authority("identity")?;

        if self.next_id as usize >= MAX_PLAYERS {
            return Err(GameError::MatchFull);
        }

        let id = PlayerId(self.next_id);
        self.next_id += 1;
        info!("Assigned identity {}", id);
        Ok(id)
    }

    pub fn issued(&self) -> u32 {
        self.next_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPoint {
    pub tag: SpawnTag,
    pub location: Vec3,
}

/// Maps identities to the level's tagged spawn markers
#[derive(Debug)]
pub struct SpawnAllocator {
    level: Level,
    collected: Option<Vec<SpawnPoint>>,
}

impl SpawnAllocator {
    pub fn new(level: Level) -> Self {
        Self {
            level,
            collected: None,
        }
    }

    /// Scans the level for `Player1`/`Player2` markers on first use.
    /// Later calls return the cached list.
    pub fn collect_spawn_points(&mut self) -> &[SpawnPoint] {
        let level = &self.level;
        self.collected.get_or_insert_with(|| {
            let points: Vec<SpawnPoint> = [SpawnTag::Player1, SpawnTag::Player2]
                .into_iter()
                .filter_map(|tag| {
                    let marker = level
                        .spawn_markers
                        .iter()
                        .find(|marker| marker.tag == tag.as_str());
                    if marker.is_none() {
                        warn!("Level '{}' has no {} spawn marker", level.name, tag.as_str());
                    }
                    marker.map(|marker| SpawnPoint {
                        tag,
                        location: marker.location,
                    })
                })
                .collect();
            info!("Collected {} spawn points", points.len());
            points
        })
    }

    /// Fixed mapping: id 0 spawns at `Player1`, id 1 at `Player2`.
    pub fn choose_spawn(&mut self, id: PlayerId) -> Result<Vec3, GameError> {
        let tag = match id.0 {
            0 => SpawnTag::Player1,
            1 => SpawnTag::Player2,
            _ => return Err(GameError::InvalidIdentity(id)),
        };
        self.location_for(tag)
    }

    /// Uniform coin flip between the two tagged spawns, independent of who
    /// is respawning.
    pub fn random_spawn(&mut self, rng: &mut impl Rng) -> Result<Vec3, GameError> {
        let tag = if rng.gen_bool(0.5) {
            SpawnTag::Player1
        } else {
            SpawnTag::Player2
        };
        self.location_for(tag)
    }

    fn location_for(&mut self, tag: SpawnTag) -> Result<Vec3, GameError> {
        self.collect_spawn_points()
            .iter()
            .find(|point| point.tag == tag)
            .map(|point| point.location)
            .ok_or(GameError::MissingSpawnPoint(tag))
    }

    pub fn level(&self) -> &Level {
        &self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::level::SpawnMarker;

    #[test]
    fn test_identities_start_at_zero_and_increase() {
        let ctx = ExecutionContext::dedicated_server();
        let mut identities = IdentityAllocator::new();

        assert_eq!(identities.assign(&ctx), Ok(PlayerId(0)));
        assert_eq!(identities.assign(&ctx), Ok(PlayerId(1)));
        assert_eq!(identities.assign(&ctx), Err(GameError::MatchFull));
        assert_eq!(identities.issued(), 2);
    }

    #[test]
    fn test_client_cannot_assign_identity() {
        let mut identities = IdentityAllocator::new();
        assert_eq!(
            identities.assign(&ExecutionContext::client(None)),
            Err(GameError::UnauthorizedMutation("identity"))
        );
        assert_eq!(identities.issued(), 0);
    }

    #[test]
    fn test_choose_spawn_is_fixed_per_id() {
        let mut spawns = SpawnAllocator::new(Level::arena());

        let first = spawns.choose_spawn(PlayerId(0)).unwrap();
        let second = spawns.choose_spawn(PlayerId(1)).unwrap();
        assert_eq!(first, Vec3::new(-1500.0, 0.0, 100.0));
        assert_eq!(second, Vec3::new(1500.0, 0.0, 100.0));

        // Idempotent across repeated calls
        assert_eq!(spawns.choose_spawn(PlayerId(0)).unwrap(), first);
        assert_eq!(spawns.choose_spawn(PlayerId(1)).unwrap(), second);
    }

    #[test]
    fn test_choose_spawn_rejects_invalid_id() {
        let mut spawns = SpawnAllocator::new(Level::arena());
        assert_eq!(
            spawns.choose_spawn(PlayerId(2)),
            Err(GameError::InvalidIdentity(PlayerId(2)))
        );
    }

    #[test]
    fn test_missing_marker_fails_fast() {
        let mut level = Level::arena();
        level.spawn_markers = vec![SpawnMarker::new("Player1", Vec3::ZERO)];
        let mut spawns = SpawnAllocator::new(level);

        assert_eq!(spawns.choose_spawn(PlayerId(0)), Ok(Vec3::ZERO));
        assert_eq!(
            spawns.choose_spawn(PlayerId(1)),
            Err(GameError::MissingSpawnPoint(SpawnTag::Player2))
        );
    }

    #[test]
    fn test_collection_is_cached() {
        let mut spawns = SpawnAllocator::new(Level::arena());
        assert_eq!(spawns.collect_spawn_points().len(), 2);

        // Later edits to the markers are not observed once collected
        spawns.level.spawn_markers.clear();
        assert_eq!(spawns.collect_spawn_points().len(), 2);
    }

    #[test]
    fn test_random_spawn_uses_both_points() {
        let mut spawns = SpawnAllocator::new(Level::arena());
        let mut rng = StdRng::seed_from_u64(7);

        let picks: Vec<Vec3> = (0..64)
            .map(|_| spawns.random_spawn(&mut rng).unwrap())
            .collect();
        assert!(picks.contains(&Vec3::new(-1500.0, 0.0, 100.0)));
        assert!(picks.contains(&Vec3::new(1500.0, 0.0, 100.0)));
    }
}
