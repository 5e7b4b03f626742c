//! Wire payloads exchanged between the authority and its clients.

use crate::actor::{ActorId, PlayerId, TrustTag};
use crate::level::Level;
use crate::score::MatchScore;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Presentation-only record of a shot, replayed by observers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitNotification {
    pub origin: Vec3,
    pub shoot_direction: Vec3,
}

/// What the shooter's trace reported hitting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitTarget {
    pub actor: ActorId,
    pub trust: TrustTag,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NotifyHit {
    pub impact_point: Vec3,
    pub distance: f32,
    /// `None` when the block was anonymous geometry such as the floor.
    pub target: Option<HitTarget>,
    pub shoot_direction: Vec3,
}

impl NotifyHit {
    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }
}

/// Identifies one replicated field for version tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKey {
    Health(ActorId),
    HitNotification(ActorId),
    Score,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ReplicatedField {
    Health {
        character: ActorId,
        health: f32,
    },
    HitNotification {
        character: ActorId,
        notification: HitNotification,
    },
    Score(MatchScore),
}

impl ReplicatedField {
    pub fn key(&self) -> FieldKey {
        match self {
            ReplicatedField::Health { character, .. } => FieldKey::Health(*character),
            ReplicatedField::HitNotification { character, .. } => {
                FieldKey::HitNotification(*character)
            }
            ReplicatedField::Score(_) => FieldKey::Score,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    Heartbeat,
    NotifyHit(NotifyHit),
    NotifyMiss {
        shoot_direction: Vec3,
    },
    RespawnRequest,
    Disconnect,

    Connected {
        player_id: PlayerId,
        level: Level,
    },
    CharacterSpawned {
        character: ActorId,
        owner: PlayerId,
        location: Vec3,
        health: f32,
    },
    Possessed {
        character: ActorId,
    },
    Unpossessed,
    HideCharacter {
        character: ActorId,
    },
    CharacterRemoved {
        character: ActorId,
    },
    FieldChanged {
        version: u64,
        field: ReplicatedField,
    },
    Disconnected {
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use bincode::{deserialize, serialize};

    #[test]
    fn test_packet_serialization_notify_hit() {
        let packet = Packet::NotifyHit(NotifyHit {
            impact_point: Vec3::new(1458.0, 0.0, 150.0),
            distance: 2958.0,
            target: Some(HitTarget {
                actor: ActorId::Character(2),
                trust: TrustTag::Authoritative,
            }),
            shoot_direction: Vec3::X,
        });

        let serialized = serialize(&packet).unwrap();
        let deserialized: Packet = deserialize(&serialized).unwrap();

        match deserialized {
            Packet::NotifyHit(notify) => {
                assert!(notify.has_target());
                assert_eq!(notify.target.unwrap().actor, ActorId::Character(2));
                assert_eq!(notify.shoot_direction, Vec3::X);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_connected_carries_level() {
        let packet = Packet::Connected {
            player_id: PlayerId(1),
            level: Level::arena(),
        };

        let serialized = serialize(&packet).unwrap();
        let deserialized: Packet = deserialize(&serialized).unwrap();
        assert_eq!(deserialized, packet);
    }

    #[test]
    fn test_field_keys() {
        let health = ReplicatedField::Health {
            character: ActorId::Character(3),
            health: 2.0,
        };
        let hit = ReplicatedField::HitNotification {
            character: ActorId::Character(3),
            notification: HitNotification {
                origin: Vec3::ZERO,
                shoot_direction: Vec3::X,
            },
        };
        assert_eq!(health.key(), FieldKey::Health(ActorId::Character(3)));
        assert_eq!(hit.key(), FieldKey::HitNotification(ActorId::Character(3)));
        assert_ne!(health.key(), hit.key());
        assert_eq!(ReplicatedField::Score(MatchScore::new()).key(), FieldKey::Score);
    }
}
