//! Identifiers and the closed set of actor capabilities used by traces and
//! the damage trust gate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Player identity handed out at login. Only 0 and 1 are valid in a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

impl PlayerId {
    pub const PLAYER_ONE: PlayerId = PlayerId(0);
    pub const PLAYER_TWO: PlayerId = PlayerId(1);

    pub fn is_player_one(self) -> bool {
        self == Self::PLAYER_ONE
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player {}", self.0)
    }
}

/// Anything a ray can report as hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActorId {
    /// Level prop, index into `Level::props`.
    Prop(u16),
    /// Character body, allocated by the authority for each (re)spawn.
    Character(u32),
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorId::Prop(index) => write!(f, "prop#{}", index),
            ActorId::Character(id) => write!(f, "character#{}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorKind {
    PlayerCharacter,
    StaticGeometry,
    Other,
}

impl ActorKind {
    /// Only combatants may be the causer of damage.
    pub fn can_deal_damage(self) -> bool {
        matches!(self, ActorKind::PlayerCharacter)
    }

    pub fn can_take_damage(self) -> bool {
        matches!(self, ActorKind::PlayerCharacter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mobility {
    Static,
    Stationary,
    Movable,
}

impl Mobility {
    pub fn is_dynamic(self) -> bool {
        self == Mobility::Movable
    }
}

/// How far a reported hit on an actor can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrustTag {
    /// Simulated by the authority (players, movable props).
    Authoritative,
    /// Static or stationary level geometry.
    NonAuthoritativeGeometry,
}

/// Everything a trace learns about the actor it hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorRef {
    pub id: ActorId,
    pub kind: ActorKind,
    pub mobility: Mobility,
}

impl ActorRef {
    pub fn character(id: u32) -> Self {
        Self {
            id: ActorId::Character(id),
            kind: ActorKind::PlayerCharacter,
            mobility: Mobility::Movable,
        }
    }

    pub fn trust(&self) -> TrustTag {
        if self.mobility.is_dynamic() {
            TrustTag::Authoritative
        } else {
            TrustTag::NonAuthoritativeGeometry
        }
    }
}
