//! Authoritative match simulation
//!
//! `MatchState` owns every gameplay-affecting value of the match: which
//! characters exist and who possesses them, their health, the score and the
//! last replicated shot of each character. Every mutation checks the
//! execution context itself, so a caller on a non-authority process is
//! rejected even if it bypasses the network layer.
//!
//! Nothing here touches sockets. Operations queue [`Broadcast`]s that the
//! network layer drains and routes, which keeps the whole protocol testable
//! in memory.

use crate::allocator::SpawnAllocator;
use glam::Vec3;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use shared::character::{CharacterState, DamageOutcome};
use shared::level::{Aabb, Level};
use shared::presentation::PresentationSink;
use shared::protocol::{FieldKey, HitNotification, NotifyHit, ReplicatedField};
use shared::replication::Replicated;
use shared::trace::{line_trace, Body};
use shared::weapon::{
    classify_impact, predict_shot, shoot_direction, ImpactClass, LocalShot, Shooter, Weapon,
};
use shared::{
    muzzle_location, ActorId, ActorKind, ActorRef, Delivery, ExecutionContext, GameError,
    MatchScore, Packet, PlayerId, CAPSULE_HALF_EXTENTS,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Who receives a queued packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    All,
    AllExcept(PlayerId),
    Only(PlayerId),
}

impl Audience {
    pub fn includes(&self, player: PlayerId) -> bool {
        match *self {
            Audience::All => true,
            Audience::AllExcept(excluded) => excluded != player,
            Audience::Only(target) => target == player,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Broadcast {
    pub audience: Audience,
    pub delivery: Delivery,
    pub packet: Packet,
}

#[derive(Debug, Clone, Default)]
pub struct MatchConfig {
    pub weapon: Weapon,
    /// Re-trace client-reported hits on movable targets before trusting them.
    pub validate_dynamic_hits: bool,
}

#[derive(Debug)]
struct Character {
    owner: PlayerId,
    location: Vec3,
    state: Replicated<CharacterState>,
    last_shot: Replicated<Option<HitNotification>>,
}

impl Character {
    fn body(&self, id: u32) -> Body {
        Body {
            actor: ActorRef::character(id),
            bounds: Aabb::new(self.location, CAPSULE_HALF_EXTENTS),
        }
    }
}

pub struct MatchState {
    pub tick: u32,
    ctx: ExecutionContext,
    config: MatchConfig,
    spawns: SpawnAllocator,
    score: Replicated<MatchScore>,
    characters: BTreeMap<u32, Character>,
    possession: HashMap<PlayerId, u32>,
    players: BTreeSet<PlayerId>,
    next_character: u32,
    rng: StdRng,
    outbox: Vec<Broadcast>,
}

impl MatchState {
    pub fn new(ctx: ExecutionContext, level: Level, config: MatchConfig, rng: StdRng) -> Self {
        Self {
            tick: 0,
            ctx,
            config,
            spawns: SpawnAllocator::new(level),
            score: Replicated::new(MatchScore::new()),
            characters: BTreeMap::new(),
            possession: HashMap::new(),
            players: BTreeSet::new(),
            next_character: 1,
            rng,
            outbox: Vec::new(),
        }
    }

    pub fn level(&self) -> &Level {
        self.spawns.level()
    }

    pub fn score(&self) -> MatchScore {
        *self.score.get()
    }

    pub fn possessed(&self, player: PlayerId) -> Option<ActorId> {
        self.possession.get(&player).map(|id| ActorId::Character(*id))
    }

    pub fn character_health(&self, character: ActorId) -> Option<f32> {
        self.character(character).map(|c| c.state.get().health())
    }

    pub fn character_location(&self, character: ActorId) -> Option<Vec3> {
        self.character(character).map(|c| c.location)
    }

    pub fn last_hit_notification(&self, character: ActorId) -> Option<HitNotification> {
        self.character(character).and_then(|c| *c.last_shot.get())
    }

    pub fn character_count(&self) -> usize {
        self.characters.len()
    }

    /// Takes every packet queued since the last drain
    pub fn drain_outbox(&mut self) -> Vec<Broadcast> {
        std::mem::take(&mut self.outbox)
    }

    fn character(&self, id: ActorId) -> Option<&Character> {
        match id {
            ActorId::Character(raw) => self.characters.get(&raw),
            ActorId::Prop(_) => None,
        }
    }

    fn queue(&mut self, audience: Audience, delivery: Delivery, packet: Packet) {
        self.outbox.push(Broadcast {
            audience,
            delivery,
            packet,
        });
    }

    fn queue_field(&mut self, audience: Audience, version: u64, field: ReplicatedField) {
        self.queue(
            audience,
            Delivery::Reliable,
            Packet::FieldChanged { version, field },
        );
    }

    fn bodies(&self) -> Vec<Body> {
        self.characters
            .iter()
            .map(|(id, character)| character.body(*id))
            .collect()
    }

    /// Resolves an actor against the authority's own world view
    fn resolve_actor(&self, id: ActorId) -> Option<ActorRef> {
        match id {
            ActorId::Prop(index) => self.level().prop_ref(index),
            ActorId::Character(raw) => self
                .characters
                .contains_key(&raw)
                .then(|| ActorRef::character(raw)),
        }
    }

    /// Login: welcome the player, bring them up to date and give them their
    /// first body at the spawn point fixed for their identity.
    pub fn player_joined(&mut self, player: PlayerId) -> Result<ActorId, GameError> {
        self.ctx.require_authority("possession")?;
        let location = self.spawns.choose_spawn(player)?;

        self.players.insert(player);
        let welcome = Packet::Connected {
            player_id: player,
            level: self.level().clone(),
        };
        self.queue(Audience::Only(player), Delivery::Reliable, welcome);
        self.send_snapshot(player);

        Ok(self.spawn_character(player, location))
    }

    /// Existing characters and current field values for a late joiner
    fn send_snapshot(&mut self, player: PlayerId) {
        let existing: Vec<(u32, PlayerId, Vec3, f32)> = self
            .characters
            .iter()
            .map(|(id, c)| (*id, c.owner, c.location, c.state.get().health()))
            .collect();

        for (id, owner, location, health) in existing {
            self.queue(
                Audience::Only(player),
                Delivery::Reliable,
                Packet::CharacterSpawned {
                    character: ActorId::Character(id),
                    owner,
                    location,
                    health,
                },
            );
        }

        if self.score.version() > 0 {
            let version = self.score.version();
            let score = *self.score.get();
            self.queue_field(Audience::Only(player), version, ReplicatedField::Score(score));
        }
    }

    /// Disconnect or timeout: the body is unpossessed, hidden and removed
    pub fn player_left(&mut self, player: PlayerId) {
        if !self.players.remove(&player) {
            debug!("{} left but was not in the match", player);
            return;
        }
        if let Some(character) = self.possession.get(&player).copied() {
            self.destroy_character(character);
        }
        info!("{} left the match", player);
    }

    fn spawn_character(&mut self, owner: PlayerId, location: Vec3) -> ActorId {
        let raw = self.next_character;
        self.next_character += 1;
        let id = ActorId::Character(raw);

        let state = CharacterState::new();
        let health = state.health();
        self.characters.insert(
            raw,
            Character {
                owner,
                location,
                state: Replicated::new(state),
                last_shot: Replicated::new(None),
            },
        );
        info!("Spawned {} for {} at {:?}", id, owner, location);

        self.queue(
            Audience::All,
            Delivery::Reliable,
            Packet::CharacterSpawned {
                character: id,
                owner,
                location,
                health,
            },
        );

        self.possession.insert(owner, raw);
        self.queue(
            Audience::Only(owner),
            Delivery::Reliable,
            Packet::Possessed { character: id },
        );
        id
    }

    fn destroy_character(&mut self, raw: u32) {
        let Some(character) = self.characters.remove(&raw) else {
            return;
        };
        let id = ActorId::Character(raw);

        if self.possession.get(&character.owner) == Some(&raw) {
            self.possession.remove(&character.owner);
            if self.players.contains(&character.owner) {
                self.queue(
                    Audience::Only(character.owner),
                    Delivery::Reliable,
                    Packet::Unpossessed,
                );
            }
            self.queue(
                Audience::All,
                Delivery::Unreliable,
                Packet::HideCharacter { character: id },
            );
        }

        self.queue(
            Audience::All,
            Delivery::Reliable,
            Packet::CharacterRemoved { character: id },
        );
        info!("Removed {}", id);
    }

    /// Respawn coordinator. A player that still possesses a body is refused.
    pub fn handle_respawn_request(
        &mut self,
        player: PlayerId,
    ) -> Result<Option<ActorId>, GameError> {
        self.ctx.require_authority("possession")?;

        if !self.players.contains(&player) {
            warn!("Respawn request from {} who is not in the match", player);
            return Ok(None);
        }
        if let Some(character) = self.possessed(player) {
            warn!("{} already possesses {}", player, character);
            return Ok(None);
        }

        let location = self.spawns.random_spawn(&mut self.rng)?;
        Ok(Some(self.spawn_character(player, location)))
    }

    /// Authoritative damage. The instigator gets kill credit when the target
    /// dies.
    pub fn apply_damage(
        &mut self,
        target: ActorId,
        instigator: PlayerId,
        source: ActorKind,
        amount: f32,
    ) -> Result<DamageOutcome, GameError> {
        self.ctx.require_authority("health")?;

        let ActorId::Character(raw) = target else {
            return Ok(DamageOutcome::Ignored);
        };
        let ctx = self.ctx;
        let character = self
            .characters
            .get_mut(&raw)
            .ok_or(GameError::StaleActorReference(target))?;

        let mut state = character.state.get().clone();
        let outcome = state.apply_damage(&ctx, amount, source, ActorKind::PlayerCharacter)?;
        if outcome == DamageOutcome::Ignored {
            return Ok(outcome);
        }

        let health = state.health();
        let version = character.state.set(state);
        self.queue_field(
            Audience::All,
            version,
            ReplicatedField::Health {
                character: target,
                health,
            },
        );

        if outcome == DamageOutcome::Killed {
            info!("{} killed {}", instigator, target);
            self.record_kill(instigator)?;
            self.destroy_character(raw);
        }

        Ok(outcome)
    }

    fn record_kill(&mut self, killer: PlayerId) -> Result<(), GameError> {
        let mut score = *self.score.get();
        score.record_kill(&self.ctx, killer.is_player_one())?;
        let version = self.score.set(score);
        self.queue_field(Audience::All, version, ReplicatedField::Score(score));
        Ok(())
    }

    /// Stores the replicated shot for observers. The shooter's owner drew it
    /// already and is skipped.
    fn record_hit_notification(&mut self, shooter: u32, origin: Vec3, direction: Vec3) {
        let Some(character) = self.characters.get_mut(&shooter) else {
            return;
        };
        let notification = HitNotification {
            origin,
            shoot_direction: direction,
        };
        let version = character.last_shot.set(Some(notification));
        let owner = character.owner;

        self.queue_field(
            Audience::AllExcept(owner),
            version,
            ReplicatedField::HitNotification {
                character: ActorId::Character(shooter),
                notification,
            },
        );
    }

    /// Confirmed impact: replicate the shot regardless of eligibility, then
    /// damage if eligible. The shot is queued first so observers re-trace it
    /// while a killed target's body still exists.
    fn confirm_impact(
        &mut self,
        shooter: u32,
        origin: Vec3,
        direction: Vec3,
        target: Option<ActorRef>,
    ) -> Result<(), GameError> {
        let owner = self.characters.get(&shooter).map(|c| c.owner);
        self.record_hit_notification(shooter, origin, direction);

        if let (Some(owner), Some(target)) = (owner, target) {
            if target.kind.can_take_damage() {
                let damage = self.config.weapon.damage;
                match self.apply_damage(target.id, owner, ActorKind::PlayerCharacter, damage) {
                    Err(GameError::StaleActorReference(stale)) => {
                        warn!("Hit on {} which no longer exists", stale);
                    }
                    other => {
                        other?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Reliable hit report from a client's local trace
    pub fn handle_notify_hit(
        &mut self,
        player: PlayerId,
        notify: &NotifyHit,
    ) -> Result<(), GameError> {
        self.ctx.require_authority("health")?;

        let Some(shooter) = self.possession.get(&player).copied() else {
            warn!("Hit report from {} with no character, ignoring", player);
            return Ok(());
        };
        let Some(location) = self.characters.get(&shooter).map(|c| c.location) else {
            return Ok(());
        };
        let origin = muzzle_location(location);
        let direction = shoot_direction(notify.shoot_direction);

        let mut target = None;
        if let Some(reported) = notify.target {
            match self.resolve_actor(reported.actor) {
                Some(actor) => {
                    if actor.trust() != reported.trust {
                        debug!(
                            "{} reported {} as {:?}, authority sees {:?}",
                            player,
                            actor.id,
                            reported.trust,
                            actor.trust()
                        );
                    }
                    target = Some(actor);
                }
                None => warn!(
                    "{} reported a hit on {} which no longer exists",
                    player, reported.actor
                ),
            }
        }

        match classify_impact(target.as_ref()) {
            // Immobile or anonymous geometry cannot be abused to fake damage
            ImpactClass::Anonymous | ImpactClass::Immobile => {}
            ImpactClass::Dynamic if self.config.validate_dynamic_hits => {
                let retrace = line_trace(
                    self.level(),
                    self.bodies(),
                    origin,
                    direction,
                    self.config.weapon.range,
                    Some(ActorId::Character(shooter)),
                );
                let confirmed = retrace.actor().map(|a| a.id);
                if confirmed != target.map(|t| t.id) {
                    warn!(
                        "Rejecting hit from {}: reported {:?}, authority traced {:?}",
                        player,
                        target.map(|t| t.id),
                        confirmed
                    );
                    target = None;
                }
            }
            // Client-reported hits on moving targets are trusted as is
            ImpactClass::Dynamic => {}
        }

        self.confirm_impact(shooter, origin, direction, target)
    }

    /// Unreliable miss report: only the beam into the void is replicated
    pub fn handle_notify_miss(
        &mut self,
        player: PlayerId,
        shoot_dir: Vec3,
    ) -> Result<(), GameError> {
        self.ctx.require_authority("hit notification")?;

        let Some(shooter) = self.possession.get(&player).copied() else {
            debug!("Miss report from {} with no character, ignoring", player);
            return Ok(());
        };
        let Some(location) = self.characters.get(&shooter).map(|c| c.location) else {
            return Ok(());
        };

        self.record_hit_notification(
            shooter,
            muzzle_location(location),
            shoot_direction(shoot_dir),
        );
        Ok(())
    }

    /// Shot fired by a player hosted on the authority itself. The trace is
    /// already authoritative, so no report is sent and the impact is
    /// confirmed directly.
    pub fn shoot_as_authority(
        &mut self,
        player: PlayerId,
        aim: Vec3,
        presentation: &mut dyn PresentationSink,
    ) -> Result<Option<LocalShot>, GameError> {
        self.ctx.require_authority("health")?;

        let Some(shooter) = self.possession.get(&player).copied() else {
            warn!("{} tried to shoot without a character", player);
            return Ok(None);
        };
        let Some(location) = self.characters.get(&shooter).map(|c| c.location) else {
            return Ok(None);
        };

        let pose = Shooter {
            character: ActorId::Character(shooter),
            owner: player,
            muzzle: muzzle_location(location),
        };
        let shot = predict_shot(
            &self.ctx,
            &self.config.weapon,
            self.level(),
            self.bodies(),
            &pose,
            aim,
            presentation,
        );

        self.confirm_impact(shooter, shot.origin, shot.direction, shot.trace.actor())?;
        Ok(Some(shot))
    }

    /// Version a receiver should hold for a field, for tests and diagnostics
    pub fn field_version(&self, key: FieldKey) -> Option<u64> {
        match key {
            FieldKey::Score => Some(self.score.version()),
            FieldKey::Health(id) => self.character(id).map(|c| c.state.version()),
            FieldKey::HitNotification(id) => self.character(id).map(|c| c.last_shot.version()),
        }
    }
}
