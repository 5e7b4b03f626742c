//! Code both the authority and its clients run identically: level geometry,
//! the hit-scan trace, the damage state machine, replicated field versioning
//! and the wire protocol.

use glam::Vec3;

pub mod actor;
pub mod channel;
pub mod character;
pub mod context;
pub mod error;
pub mod level;
pub mod presentation;
pub mod protocol;
pub mod replication;
pub mod score;
pub mod trace;
pub mod weapon;

pub use actor::{ActorId, ActorKind, ActorRef, Mobility, PlayerId, TrustTag};
pub use channel::{Datagram, Delivery, ReliableChannel};
pub use context::{ExecutionContext, NetworkRole};
pub use error::GameError;
pub use protocol::{HitNotification, NotifyHit, Packet, ReplicatedField};
pub use score::MatchScore;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_PLAYERS: usize = 2;

pub const MAX_HEALTH: f32 = 3.0;
pub const DAMAGE_PER_HIT: f32 = 1.0;
pub const LASER_RANGE: f32 = 4000.0;

/// Character collider, centred on the character location.
pub const CAPSULE_HALF_EXTENTS: Vec3 = Vec3::new(42.0, 42.0, 96.0);
/// Height of the muzzle pivot above the character location.
pub const MUZZLE_HEIGHT: f32 = 50.0;

pub const RESEND_INTERVAL_MS: u64 = 100;

pub fn muzzle_location(character_location: Vec3) -> Vec3 {
    character_location + Vec3::Z * MUZZLE_HEIGHT
}
