//! The single ray cast each shot performs.

use crate::actor::{ActorId, ActorRef};
use crate::level::{Aabb, Level};
use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TraceResult {
    /// Something blocked the ray. `actor` is `None` for anonymous world
    /// geometry such as the floor plane.
    Blocking {
        actor: Option<ActorRef>,
        distance: f32,
        impact_point: Vec3,
    },
    NoHit,
}

impl TraceResult {
    pub fn is_blocking(&self) -> bool {
        matches!(self, TraceResult::Blocking { .. })
    }

    pub fn actor(&self) -> Option<ActorRef> {
        match self {
            TraceResult::Blocking { actor, .. } => *actor,
            TraceResult::NoHit => None,
        }
    }

    /// Where the beam visually stops: the impact, or the end of the range.
    pub fn endpoint(&self, origin: Vec3, direction: Vec3, range: f32) -> Vec3 {
        match self {
            TraceResult::Blocking { distance, .. } => origin + direction * *distance,
            TraceResult::NoHit => origin + direction * range,
        }
    }
}

/// Collider of a character currently in the world.
#[derive(Debug, Clone, Copy)]
pub struct Body {
    pub actor: ActorRef,
    pub bounds: Aabb,
}

/// Casts a ray of length `range` from `origin` along the unit `direction`
/// against the level and the given bodies, skipping `ignore`.
pub fn line_trace(
    level: &Level,
    bodies: impl IntoIterator<Item = Body>,
    origin: Vec3,
    direction: Vec3,
    range: f32,
    ignore: Option<ActorId>,
) -> TraceResult {
    let mut best: Option<(f32, Option<ActorRef>)> = None;
    let mut consider = |t: f32, actor: Option<ActorRef>| {
        if t <= range && best.map_or(true, |(best_t, _)| t < best_t) {
            best = Some((t, actor));
        }
    };

    let candidates = level
        .prop_colliders()
        .chain(bodies.into_iter().map(|body| (body.actor, body.bounds)));
    for (actor, bounds) in candidates {
        if Some(actor.id) == ignore {
            continue;
        }
        if let Some(t) = bounds.ray_intersects(origin, direction) {
            consider(t, Some(actor));
        }
    }

    if let Some(floor_z) = level.floor_z {
        if direction.z < 0.0 && origin.z >= floor_z {
            consider((floor_z - origin.z) / direction.z, None);
        }
    }

    match best {
        Some((distance, actor)) => TraceResult::Blocking {
            actor,
            distance,
            impact_point: origin + direction * distance,
        },
        None => TraceResult::NoHit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorKind;
    use crate::{CAPSULE_HALF_EXTENTS, LASER_RANGE};
    use assert_approx_eq::assert_approx_eq;

    fn body_at(id: u32, location: Vec3) -> Body {
        Body {
            actor: ActorRef::character(id),
            bounds: Aabb::new(location, CAPSULE_HALF_EXTENTS),
        }
    }

    #[test]
    fn test_trace_hits_nearest_character() {
        let level = Level::arena();
        let origin = Vec3::new(-1500.0, 0.0, 150.0);
        let bodies = [
            body_at(1, Vec3::new(-1500.0, 0.0, 100.0)),
            body_at(2, Vec3::new(1500.0, 0.0, 100.0)),
        ];

        let result = line_trace(
            &level,
            bodies,
            origin,
            Vec3::X,
            LASER_RANGE,
            Some(ActorId::Character(1)),
        );

        match result {
            TraceResult::Blocking { actor, distance, impact_point } => {
                assert_eq!(actor.unwrap().id, ActorId::Character(2));
                assert_approx_eq!(distance, 3000.0 - 42.0, 0.01);
                assert_approx_eq!(impact_point.x, 1458.0, 0.01);
            }
            TraceResult::NoHit => panic!("expected a blocking hit"),
        }
    }

    #[test]
    fn test_trace_without_ignore_hits_shooter() {
        let level = Level::arena();
        let origin = Vec3::new(-1500.0, 0.0, 150.0);
        let shooter = [body_at(1, Vec3::new(-1500.0, 0.0, 100.0))];
        let result = line_trace(&level, shooter, origin, Vec3::X, LASER_RANGE, None);
        assert_eq!(result.actor().unwrap().id, ActorId::Character(1));
    }

    #[test]
    fn test_trace_into_sky_is_no_hit() {
        let level = Level::arena();
        let origin = Vec3::new(0.0, 0.0, 150.0);
        let result = line_trace(&level, [], origin, Vec3::Z, LASER_RANGE, None);
        assert_eq!(result, TraceResult::NoHit);
        assert_eq!(
            result.endpoint(Vec3::new(0.0, 0.0, 150.0), Vec3::Z, LASER_RANGE),
            Vec3::new(0.0, 0.0, 150.0 + LASER_RANGE)
        );
    }

    #[test]
    fn test_floor_hit_has_no_actor() {
        let level = Level::arena();
        let origin = Vec3::new(300.0, 0.0, 150.0);
        let result = line_trace(&level, [], origin, -Vec3::Z, LASER_RANGE, None);
        match result {
            TraceResult::Blocking { actor, distance, .. } => {
                assert!(actor.is_none());
                assert_approx_eq!(distance, 150.0, 0.001);
            }
            TraceResult::NoHit => panic!("floor should block"),
        }
    }

    #[test]
    fn test_range_limits_hits() {
        let level = Level::arena();
        let origin = Vec3::new(-1500.0, 0.0, 150.0);
        let target = [body_at(2, Vec3::new(1500.0, 0.0, 100.0))];
        let result = line_trace(&level, target, origin, Vec3::X, 1000.0, None);
        assert_eq!(result, TraceResult::NoHit);
    }

    #[test]
    fn test_trace_hits_static_pillar() {
        let level = Level::arena();
        let origin = Vec3::new(-1500.0, 600.0, 150.0);
        let actor = line_trace(&level, [], origin, Vec3::X, LASER_RANGE, None).actor().unwrap();
        assert_eq!(actor.id, ActorId::Prop(0));
        assert_eq!(actor.kind, ActorKind::StaticGeometry);
    }
}
