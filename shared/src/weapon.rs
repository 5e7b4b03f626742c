//! Hit-scan laser: the pieces of the hit-confirmation protocol that run the
//! same way on every machine.
//!
//! 1. The owning machine traces locally and draws the beam immediately
//!    ([`predict_shot`]).
//! 2. A non-authoritative shooter reports the result: reliable `NotifyHit`
//!    for any blocking hit, unreliable `NotifyMiss` otherwise.
//! 3. The authority classifies the reported impact ([`classify_impact`]),
//!    applies damage and records a `HitNotification`.
//! 4. Observers re-trace from the notification's origin and direction to find
//!    their own beam endpoint ([`replay_hit_notification`]). This never
//!    touches gameplay state.

use crate::actor::{ActorId, ActorRef, PlayerId};
use crate::channel::Delivery;
use crate::context::ExecutionContext;
use crate::level::Level;
use crate::presentation::{EffectAsset, PresentationSink};
use crate::protocol::{HitNotification, HitTarget, NotifyHit, Packet};
use crate::trace::{line_trace, Body, TraceResult};
use crate::{DAMAGE_PER_HIT, LASER_RANGE};
use glam::Vec3;
use log::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct Weapon {
    pub range: f32,
    pub damage: f32,
    pub effect: Option<EffectAsset>,
}

impl Default for Weapon {
    fn default() -> Self {
        Self {
            range: LASER_RANGE,
            damage: DAMAGE_PER_HIT,
            effect: Some(EffectAsset("laser_beam".to_string())),
        }
    }
}

impl Weapon {
    pub fn without_effect() -> Self {
        Self {
            effect: None,
            ..Self::default()
        }
    }

    /// Draws the beam if this weapon has an effect asset and the process
    /// renders at all. Otherwise a silent no-op.
    pub fn spawn_trail(
        &self,
        ctx: &ExecutionContext,
        presentation: &mut dyn PresentationSink,
        origin: Vec3,
        end: Vec3,
    ) {
        if !ctx.renders_effects() {
            return;
        }
        if let Some(effect) = &self.effect {
            presentation.spawn_trail(effect, origin, end);
        }
    }
}

/// Shooter pose at the moment of firing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shooter {
    pub character: ActorId,
    pub owner: PlayerId,
    pub muzzle: Vec3,
}

/// Normalizes an aim vector. A degenerate aim fires along +X.
pub fn shoot_direction(aim: Vec3) -> Vec3 {
    aim.try_normalize().unwrap_or(Vec3::X)
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalShot {
    pub origin: Vec3,
    pub direction: Vec3,
    pub trace: TraceResult,
    pub endpoint: Vec3,
    /// Message for the authority, when the shooter is a client.
    pub report: Option<(Packet, Delivery)>,
}

/// Local prediction plus the choice of reconciliation message.
pub fn predict_shot(
    ctx: &ExecutionContext,
    weapon: &Weapon,
    level: &Level,
    bodies: impl IntoIterator<Item = Body>,
    shooter: &Shooter,
    aim: Vec3,
    presentation: &mut dyn PresentationSink,
) -> LocalShot {
    let origin = shooter.muzzle;
    let direction = shoot_direction(aim);
    let trace = line_trace(
        level,
        bodies,
        origin,
        direction,
        weapon.range,
        Some(shooter.character),
    );
    let endpoint = trace.endpoint(origin, direction, weapon.range);

    let report = if !ctx.is_authority() && ctx.is_locally_controlled(shooter.owner) {
        Some(report_for(&trace, direction))
    } else {
        None
    };

    weapon.spawn_trail(ctx, presentation, origin, endpoint);

    LocalShot {
        origin,
        direction,
        trace,
        endpoint,
        report,
    }
}

fn report_for(trace: &TraceResult, direction: Vec3) -> (Packet, Delivery) {
    match *trace {
        TraceResult::Blocking {
            actor,
            distance,
            impact_point,
        } => {
            let target = actor.map(|actor| HitTarget {
                actor: actor.id,
                trust: actor.trust(),
            });
            (
                Packet::NotifyHit(NotifyHit {
                    impact_point,
                    distance,
                    target,
                    shoot_direction: direction,
                }),
                Delivery::Reliable,
            )
        }
        TraceResult::NoHit => (
            Packet::NotifyMiss {
                shoot_direction: direction,
            },
            Delivery::Unreliable,
        ),
    }
}

/// Trust class of a reported impact, as judged by the authority from its
/// own view of the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpactClass {
    /// Blocking hit on world geometry with no actor.
    Anonymous,
    /// Static or stationary actor; cannot be abused to fake damage.
    Immobile,
    /// A potentially moving actor such as a player.
    Dynamic,
}

pub fn classify_impact(target: Option<&ActorRef>) -> ImpactClass {
    match target {
        None => ImpactClass::Anonymous,
        Some(actor) if actor.mobility.is_dynamic() => ImpactClass::Dynamic,
        Some(_) => ImpactClass::Immobile,
    }
}

/// Observer-side replay of a replicated shot. Returns the endpoint drawn.
pub fn replay_hit_notification(
    ctx: &ExecutionContext,
    weapon: &Weapon,
    level: &Level,
    bodies: impl IntoIterator<Item = Body>,
    shooter_character: ActorId,
    notification: &HitNotification,
    presentation: &mut dyn PresentationSink,
) -> Vec3 {
    let direction = shoot_direction(notification.shoot_direction);
    let trace = line_trace(
        level,
        bodies,
        notification.origin,
        direction,
        weapon.range,
        Some(shooter_character),
    );
    let endpoint = trace.endpoint(notification.origin, direction, weapon.range);
    debug!(
        "Replaying shot from {} ending at {:?}",
        shooter_character, endpoint
    );

    weapon.spawn_trail(ctx, presentation, notification.origin, endpoint);
    endpoint
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{ActorKind, Mobility, TrustTag};
    use crate::level::Aabb;
    use crate::presentation::RecordingPresentation;
    use crate::CAPSULE_HALF_EXTENTS;
    use assert_approx_eq::assert_approx_eq;

    fn shooter() -> Shooter {
        Shooter {
            character: ActorId::Character(1),
            owner: PlayerId(0),
            muzzle: Vec3::new(-1500.0, 0.0, 150.0),
        }
    }

    fn bodies() -> Vec<Body> {
        vec![
            Body {
                actor: ActorRef::character(1),
                bounds: Aabb::new(Vec3::new(-1500.0, 0.0, 100.0), CAPSULE_HALF_EXTENTS),
            },
            Body {
                actor: ActorRef::character(2),
                bounds: Aabb::new(Vec3::new(1500.0, 0.0, 100.0), CAPSULE_HALF_EXTENTS),
            },
        ]
    }

    fn client() -> ExecutionContext {
        ExecutionContext::client(Some(PlayerId(0)))
    }

    #[test]
    fn test_client_hit_on_player_sends_reliable_notify_hit() {
        let mut presentation = RecordingPresentation::default();
        let shot = predict_shot(
            &client(),
            &Weapon::default(),
            &Level::arena(),
            bodies(),
            &shooter(),
            Vec3::X,
            &mut presentation,
        );

        match shot.report {
            Some((Packet::NotifyHit(notify), Delivery::Reliable)) => {
                let target = notify.target.unwrap();
                assert_eq!(target.actor, ActorId::Character(2));
                assert_eq!(target.trust, TrustTag::Authoritative);
                assert_approx_eq!(notify.impact_point.x, 1458.0, 0.01);
            }
            other => panic!("unexpected report {:?}", other),
        }

        // Immediate local feedback ends at the impact
        assert_eq!(presentation.trails.len(), 1);
        assert_approx_eq!(presentation.trails[0].1.x, 1458.0, 0.01);
    }

    #[test]
    fn test_client_hit_on_wall_still_sends_notify_hit() {
        let mut presentation = RecordingPresentation::default();
        let mut pose = shooter();
        pose.muzzle = Vec3::new(-1500.0, 600.0, 150.0);

        let shot = predict_shot(
            &client(),
            &Weapon::default(),
            &Level::arena(),
            Vec::new(),
            &pose,
            Vec3::X,
            &mut presentation,
        );

        match shot.report {
            Some((Packet::NotifyHit(notify), Delivery::Reliable)) => {
                assert_eq!(
                    notify.target.unwrap().trust,
                    TrustTag::NonAuthoritativeGeometry
                );
            }
            other => panic!("unexpected report {:?}", other),
        }
    }

    #[test]
    fn test_client_floor_hit_has_no_target() {
        let mut presentation = RecordingPresentation::default();
        let shot = predict_shot(
            &client(),
            &Weapon::default(),
            &Level::arena(),
            Vec::new(),
            &shooter(),
            -Vec3::Z,
            &mut presentation,
        );

        match shot.report {
            Some((Packet::NotifyHit(notify), Delivery::Reliable)) => {
                assert!(!notify.has_target());
            }
            other => panic!("unexpected report {:?}", other),
        }
    }

    #[test]
    fn test_client_miss_sends_unreliable_notify_miss() {
        let mut presentation = RecordingPresentation::default();
        let shot = predict_shot(
            &client(),
            &Weapon::default(),
            &Level::arena(),
            bodies(),
            &shooter(),
            Vec3::Z,
            &mut presentation,
        );

        assert_eq!(
            shot.report,
            Some((
                Packet::NotifyMiss {
                    shoot_direction: Vec3::Z
                },
                Delivery::Unreliable
            ))
        );
        assert_eq!(shot.endpoint, shooter().muzzle + Vec3::Z * LASER_RANGE);
    }

    #[test]
    fn test_authority_shooter_sends_nothing() {
        let mut presentation = RecordingPresentation::default();
        let shot = predict_shot(
            &ExecutionContext::listen_server(PlayerId(0)),
            &Weapon::default(),
            &Level::arena(),
            bodies(),
            &shooter(),
            Vec3::X,
            &mut presentation,
        );
        assert!(shot.report.is_none());
        assert_eq!(presentation.trails.len(), 1);
    }

    #[test]
    fn test_missing_effect_is_silent() {
        let mut presentation = RecordingPresentation::default();
        let shot = predict_shot(
            &client(),
            &Weapon::without_effect(),
            &Level::arena(),
            bodies(),
            &shooter(),
            Vec3::X,
            &mut presentation,
        );
        assert!(shot.report.is_some());
        assert!(presentation.trails.is_empty());
    }

    #[test]
    fn test_classify_impact() {
        assert_eq!(classify_impact(None), ImpactClass::Anonymous);
        assert_eq!(
            classify_impact(Some(&ActorRef::character(2))),
            ImpactClass::Dynamic
        );
        let crate_prop = ActorRef {
            id: ActorId::Prop(2),
            kind: ActorKind::StaticGeometry,
            mobility: Mobility::Stationary,
        };
        assert_eq!(classify_impact(Some(&crate_prop)), ImpactClass::Immobile);
    }

    #[test]
    fn test_observer_replay_retraces_endpoint() {
        let mut presentation = RecordingPresentation::default();
        let notification = HitNotification {
            origin: shooter().muzzle,
            shoot_direction: Vec3::X,
        };

        let end = replay_hit_notification(
            &ExecutionContext::client(Some(PlayerId(1))),
            &Weapon::default(),
            &Level::arena(),
            bodies(),
            ActorId::Character(1),
            &notification,
            &mut presentation,
        );

        assert_approx_eq!(end.x, 1458.0, 0.01);
        assert_eq!(presentation.trails, vec![(notification.origin, end)]);
    }

    #[test]
    fn test_degenerate_aim_falls_back_to_forward() {
        assert_eq!(shoot_direction(Vec3::ZERO), Vec3::X);
        assert_approx_eq!(shoot_direction(Vec3::new(0.0, 3.0, 4.0)).length(), 1.0, 1e-5);
    }
}
