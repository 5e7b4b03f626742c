//! Static level description: spawn markers, props and the floor plane.
//!
//! A level is read-only once loaded. The authority sends it to each client in
//! the `Connected` packet so both sides trace against identical geometry.

use crate::actor::{ActorId, ActorKind, ActorRef, Mobility};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Axis-aligned box used for every collider in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub center: Vec3,
    pub half_extents: Vec3,
}

impl Aabb {
    pub fn new(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            center,
            half_extents,
        }
    }

    pub fn min(&self) -> Vec3 {
        self.center - self.half_extents
    }

    pub fn max(&self) -> Vec3 {
        self.center + self.half_extents
    }

    pub fn contains(&self, point: Vec3) -> bool {
        let d = (point - self.center).abs();
        d.x <= self.half_extents.x && d.y <= self.half_extents.y && d.z <= self.half_extents.z
    }

    /// Slab test. Returns the distance along `direction` (unit length) to the
    /// first intersection, or `None` when the ray misses or points away.
    pub fn ray_intersects(&self, origin: Vec3, direction: Vec3) -> Option<f32> {
        let min = self.min();
        let max = self.max();
        let mut t_near = f32::NEG_INFINITY;
        let mut t_far = f32::INFINITY;

        for axis in 0..3 {
            let o = origin[axis];
            let d = direction[axis];

            if d.abs() < 1e-8 {
                // Parallel to this slab: miss unless already between its planes
                if o < min[axis] || o > max[axis] {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / d;
            let mut t1 = (min[axis] - o) * inv;
            let mut t2 = (max[axis] - o) * inv;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            t_near = t_near.max(t1);
            t_far = t_far.min(t2);

            if t_near > t_far {
                return None;
            }
        }

        if t_far < 0.0 {
            None
        } else {
            Some(t_near.max(0.0))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpawnTag {
    Player1,
    Player2,
}

impl SpawnTag {
    pub fn as_str(self) -> &'static str {
        match self {
            SpawnTag::Player1 => "Player1",
            SpawnTag::Player2 => "Player2",
        }
    }
}

/// Named marker placed in the level data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnMarker {
    pub tag: String,
    pub location: Vec3,
}

impl SpawnMarker {
    pub fn new(tag: &str, location: Vec3) -> Self {
        Self {
            tag: tag.to_string(),
            location,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prop {
    pub name: String,
    pub kind: ActorKind,
    pub mobility: Mobility,
    pub bounds: Aabb,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub name: String,
    pub spawn_markers: Vec<SpawnMarker>,
    pub props: Vec<Prop>,
    /// Height of the anonymous floor plane. Hits on it carry no actor.
    pub floor_z: Option<f32>,
}

impl Level {
    /// The two-player arena: mirrored spawns, two pillars off the centre line,
    /// a stationary crate, a hovering drone and two back walls.
    pub fn arena() -> Self {
        let prop = |name: &str, kind, mobility, center: Vec3, half: Vec3| Prop {
            name: name.to_string(),
            kind,
            mobility,
            bounds: Aabb::new(center, half),
        };

        Self {
            name: "arena".to_string(),
            spawn_markers: vec![
                SpawnMarker::new(SpawnTag::Player1.as_str(), Vec3::new(-1500.0, 0.0, 100.0)),
                SpawnMarker::new(SpawnTag::Player2.as_str(), Vec3::new(1500.0, 0.0, 100.0)),
            ],
            props: vec![
                prop(
                    "pillar_north",
                    ActorKind::StaticGeometry,
                    Mobility::Static,
                    Vec3::new(0.0, 600.0, 300.0),
                    Vec3::new(100.0, 100.0, 300.0),
                ),
                prop(
                    "pillar_south",
                    ActorKind::StaticGeometry,
                    Mobility::Static,
                    Vec3::new(0.0, -600.0, 300.0),
                    Vec3::new(100.0, 100.0, 300.0),
                ),
                prop(
                    "crate",
                    ActorKind::StaticGeometry,
                    Mobility::Stationary,
                    Vec3::new(-600.0, 300.0, 50.0),
                    Vec3::new(50.0, 50.0, 50.0),
                ),
                prop(
                    "drone",
                    ActorKind::Other,
                    Mobility::Movable,
                    Vec3::new(600.0, -300.0, 250.0),
                    Vec3::new(30.0, 30.0, 30.0),
                ),
                prop(
                    "wall_west",
                    ActorKind::StaticGeometry,
                    Mobility::Static,
                    Vec3::new(-2000.0, 0.0, 400.0),
                    Vec3::new(20.0, 1500.0, 400.0),
                ),
                prop(
                    "wall_east",
                    ActorKind::StaticGeometry,
                    Mobility::Static,
                    Vec3::new(2000.0, 0.0, 400.0),
                    Vec3::new(20.0, 1500.0, 400.0),
                ),
            ],
            floor_z: Some(0.0),
        }
    }

    pub fn prop_ref(&self, index: u16) -> Option<ActorRef> {
        self.props.get(index as usize).map(|prop| ActorRef {
            id: ActorId::Prop(index),
            kind: prop.kind,
            mobility: prop.mobility,
        })
    }

    pub fn prop_colliders(&self) -> impl Iterator<Item = (ActorRef, Aabb)> + '_ {
        self.props.iter().enumerate().map(|(index, prop)| {
            (
                ActorRef {
                    id: ActorId::Prop(index as u16),
                    kind: prop.kind,
                    mobility: prop.mobility,
                },
                prop.bounds,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn unit_box() -> Aabb {
        Aabb::new(Vec3::new(10.0, 1.0, 0.0), Vec3::splat(1.0))
    }

    #[test]
    fn test_ray_hits_box_front_face() {
        let t = unit_box().ray_intersects(Vec3::new(0.0, 1.0, 0.0), Vec3::X);
        assert_approx_eq!(t.unwrap(), 9.0, 0.001);
    }

    #[test]
    fn test_ray_pointing_away_misses() {
        assert!(unit_box()
            .ray_intersects(Vec3::new(0.0, 1.0, 0.0), -Vec3::X)
            .is_none());
    }

    #[test]
    fn test_parallel_ray_outside_slab_misses() {
        assert!(unit_box()
            .ray_intersects(Vec3::new(0.0, 5.0, 0.0), Vec3::X)
            .is_none());
    }

    #[test]
    fn test_ray_from_inside_reports_zero() {
        let t = unit_box().ray_intersects(Vec3::new(10.0, 1.0, 0.0), Vec3::Y);
        assert_eq!(t, Some(0.0));
    }

    #[test]
    fn test_contains() {
        let aabb = unit_box();
        assert!(aabb.contains(Vec3::new(10.5, 1.5, 0.5)));
        assert!(!aabb.contains(Vec3::new(12.0, 1.0, 0.0)));
    }

    #[test]
    fn test_arena_has_both_spawn_tags() {
        let level = Level::arena();
        let tags: Vec<&str> = level.spawn_markers.iter().map(|m| m.tag.as_str()).collect();
        assert!(tags.contains(&"Player1"));
        assert!(tags.contains(&"Player2"));
        assert_eq!(level.prop_colliders().count(), level.props.len());
    }

    #[test]
    fn test_prop_ref_out_of_range() {
        let level = Level::arena();
        assert!(level.prop_ref(0).is_some());
        assert!(level.prop_ref(200).is_none());
    }
}
