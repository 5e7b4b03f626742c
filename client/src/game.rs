use glam::Vec3;
use log::{debug, info, warn};
use shared::character::health_fraction;
use shared::level::{Aabb, Level};
use shared::presentation::PresentationSink;
use shared::protocol::{FieldKey, ReplicatedField};
use shared::replication::FieldMirror;
use shared::trace::Body;
use shared::weapon::{predict_shot, replay_hit_notification, LocalShot, Shooter, Weapon};
use shared::{
    muzzle_location, ActorId, ActorRef, ExecutionContext, MatchScore, Packet, PlayerId,
    CAPSULE_HALF_EXTENTS, MAX_HEALTH,
};
use std::collections::BTreeMap;

/// Client-side view of a character, as last replicated
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCharacter {
    pub owner: PlayerId,
    pub location: Vec3,
    pub health: f32,
    pub visible: bool,
}

pub struct ClientGameState {
    ctx: ExecutionContext,
    weapon: Weapon,
    level: Option<Level>,
    characters: BTreeMap<ActorId, RemoteCharacter>,
    mirror: FieldMirror,
    possessed: Option<ActorId>,
    score: MatchScore,
    connected: bool,
    disconnect_reason: Option<String>,
}

impl ClientGameState {
    pub fn new(weapon: Weapon) -> Self {
        Self {
            ctx: ExecutionContext::client(None),
            weapon,
            level: None,
            characters: BTreeMap::new(),
            mirror: FieldMirror::new(),
            possessed: None,
            score: MatchScore::new(),
            connected: false,
            disconnect_reason: None,
        }
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        self.ctx.local_player
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn disconnect_reason(&self) -> Option<&str> {
        self.disconnect_reason.as_deref()
    }

    pub fn possessed(&self) -> Option<ActorId> {
        self.possessed
    }

    pub fn score(&self) -> MatchScore {
        self.score
    }

    pub fn character(&self, id: ActorId) -> Option<&RemoteCharacter> {
        self.characters.get(&id)
    }

    pub fn characters(&self) -> impl Iterator<Item = (&ActorId, &RemoteCharacter)> {
        self.characters.iter()
    }

    /// Health of the locally possessed character, if any
    pub fn local_health(&self) -> Option<f32> {
        self.possessed
            .and_then(|id| self.characters.get(&id))
            .map(|c| c.health)
    }

    fn bodies(&self) -> Vec<Body> {
        self.characters
            .iter()
            .filter(|(_, c)| c.visible)
            .filter_map(|(id, c)| match id {
                ActorId::Character(raw) => Some(Body {
                    actor: ActorRef::character(*raw),
                    bounds: Aabb::new(c.location, CAPSULE_HALF_EXTENTS),
                }),
                ActorId::Prop(_) => None,
            })
            .collect()
    }

    fn is_local(&self, owner: PlayerId) -> bool {
        self.ctx.is_locally_controlled(owner)
    }

    /// Applies one packet from the authority
    pub fn apply_packet(&mut self, packet: Packet, presentation: &mut dyn PresentationSink) {
        match packet {
            Packet::Connected { player_id, level } => {
                if self.connected {
                    debug!("Repeated welcome as {}", player_id);
                    return;
                }
                info!("Connected as {} on level '{}'", player_id, level.name);
                self.ctx = ExecutionContext::client(Some(player_id));
                self.level = Some(level);
                self.connected = true;
            }

            Packet::CharacterSpawned {
                character,
                owner,
                location,
                health,
            } => {
                debug!("{} spawned for {} at {:?}", character, owner, location);
                self.characters.insert(
                    character,
                    RemoteCharacter {
                        owner,
                        location,
                        health,
                        visible: true,
                    },
                );
                if self.is_local(owner) {
                    presentation.health_changed(health_fraction(health, MAX_HEALTH));
                }
            }

            Packet::Possessed { character } => {
                info!("Now controlling {}", character);
                self.possessed = Some(character);
            }

            Packet::Unpossessed => {
                info!("Lost control of {:?}", self.possessed);
                self.possessed = None;
            }

            Packet::HideCharacter { character } => {
                if let Some(c) = self.characters.get_mut(&character) {
                    c.visible = false;
                }
                presentation.hide_character(character);
            }

            Packet::CharacterRemoved { character } => {
                self.characters.remove(&character);
                self.mirror.forget(FieldKey::Health(character));
                self.mirror.forget(FieldKey::HitNotification(character));
                if self.possessed == Some(character) {
                    self.possessed = None;
                }
            }

            Packet::FieldChanged { version, field } => {
                if !self.mirror.accept(field.key(), version) {
                    debug!("Dropping stale {:?} at version {}", field.key(), version);
                    return;
                }
                self.apply_field(field, presentation);
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.possessed = None;
                self.disconnect_reason = Some(reason);
            }

            other => {
                warn!("Unexpected packet from server: {:?}", other);
            }
        }
    }

    fn apply_field(&mut self, field: ReplicatedField, presentation: &mut dyn PresentationSink) {
        match field {
            ReplicatedField::Health { character, health } => {
                let Some(c) = self.characters.get_mut(&character) else {
                    debug!("Health for unknown {}", character);
                    return;
                };
                c.health = health;
                let owner = c.owner;
                if self.is_local(owner) {
                    presentation.health_changed(health_fraction(health, MAX_HEALTH));
                }
            }

            ReplicatedField::HitNotification {
                character,
                notification,
            } => {
                let Some(shooter) = self.characters.get(&character) else {
                    debug!("Shot from unknown {}", character);
                    return;
                };
                // Our own shots were drawn when fired
                if self.is_local(shooter.owner) {
                    return;
                }
                let Some(level) = &self.level else {
                    return;
                };
                replay_hit_notification(
                    &self.ctx,
                    &self.weapon,
                    level,
                    self.bodies(),
                    character,
                    &notification,
                    presentation,
                );
            }

            ReplicatedField::Score(score) => {
                info!(
                    "Score: player 1 {} - player 2 {}",
                    score.player1_score, score.player2_score
                );
                self.score = score;
                presentation.score_changed(score);
            }
        }
    }

    /// Fires from the possessed character. The returned shot carries the
    /// report for the server.
    pub fn shoot(&self, aim: Vec3, presentation: &mut dyn PresentationSink) -> Option<LocalShot> {
        let character = self.possessed?;
        let owner = self.player_id()?;
        let level = self.level.as_ref()?;
        let location = self.characters.get(&character)?.location;

        let shooter = Shooter {
            character,
            owner,
            muzzle: muzzle_location(location),
        };
        Some(predict_shot(
            &self.ctx,
            &self.weapon,
            level,
            self.bodies(),
            &shooter,
            aim,
            presentation,
        ))
    }

    /// Asks for a new body. Only meaningful on a connected client that
    /// currently possesses nothing.
    pub fn try_respawn(&self) -> Option<Packet> {
        if self.ctx.is_authority() || !self.connected {
            return None;
        }
        if let Some(character) = self.possessed {
            info!("Already possessing {}", character);
            return None;
        }
        Some(Packet::RespawnRequest)
    }

    /// Direction from our muzzle to the nearest visible opponent
    pub fn aim_at_opponent(&self) -> Option<Vec3> {
        let own = self.possessed.and_then(|id| self.characters.get(&id))?;
        let muzzle = muzzle_location(own.location);

        self.characters
            .iter()
            .filter(|(id, c)| Some(**id) != self.possessed && c.visible)
            .map(|(_, c)| c.location - muzzle)
            .min_by(|a, b| a.length_squared().total_cmp(&b.length_squared()))
    }
}
