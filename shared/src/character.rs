//! Per-character health and the damage state machine.
//!
//! A character is `Alive` while health is above zero. The hit that takes it to
//! zero or below moves it to `Dead`, which is terminal: the authority removes
//! the body and a respawn creates a fresh instance at full health.

use crate::actor::ActorKind;
use crate::context::ExecutionContext;
use crate::error::GameError;
use crate::MAX_HEALTH;
use log::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DamageOutcome {
    /// Trust gate rejected the source, or the character was already dead.
    Ignored,
    Damaged { health: f32 },
    Killed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CharacterState {
    health: f32,
    max_health: f32,
}

impl Default for CharacterState {
    fn default() -> Self {
        Self::new()
    }
}

impl CharacterState {
    pub fn new() -> Self {
        Self {
            health: MAX_HEALTH,
            max_health: MAX_HEALTH,
        }
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn max_health(&self) -> f32 {
        self.max_health
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    /// Normalized health for the health bar, clamped for display.
    pub fn fraction(&self) -> f32 {
        health_fraction(self.health, self.max_health)
    }

    /// Applies one hit. Rejected outright off the authority; silently ignored
    /// when `source` is not allowed to deal damage to `target`.
    pub fn apply_damage(
        &mut self,
        ctx: &ExecutionContext,
        amount: f32,
        source: ActorKind,
        target: ActorKind,
    ) -> Result<DamageOutcome, GameError> {
        ctx.require_authority("health")?;

        if !source.can_deal_damage() || !target.can_take_damage() {
            debug!("Ignoring damage from {:?} to {:?}", source, target);
            return Ok(DamageOutcome::Ignored);
        }

        if !self.is_alive() {
            return Ok(DamageOutcome::Ignored);
        }

        self.health -= amount;
        info!("Character took {} damage, health now {}", amount, self.health);

        if self.is_alive() {
            Ok(DamageOutcome::Damaged {
                health: self.health,
            })
        } else {
            Ok(DamageOutcome::Killed)
        }
    }
}

pub fn health_fraction(health: f32, max_health: f32) -> f32 {
    if max_health <= 0.0 {
        return 0.0;
    }
    (health / max_health).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::PlayerId;
    use crate::DAMAGE_PER_HIT;
    use assert_approx_eq::assert_approx_eq;

    fn authority() -> ExecutionContext {
        ExecutionContext::dedicated_server()
    }

    fn hit(state: &mut CharacterState) -> DamageOutcome {
        state
            .apply_damage(
                &authority(),
                DAMAGE_PER_HIT,
                ActorKind::PlayerCharacter,
                ActorKind::PlayerCharacter,
            )
            .unwrap()
    }

    #[test]
    fn test_new_character_has_full_health() {
        let state = CharacterState::new();
        assert_eq!(state.health(), MAX_HEALTH);
        assert!(state.is_alive());
        assert_approx_eq!(state.fraction(), 1.0);
    }

    #[test]
    fn test_fewer_hits_than_max_health_keep_character_alive() {
        let mut state = CharacterState::new();
        assert_eq!(hit(&mut state), DamageOutcome::Damaged { health: 2.0 });
        assert_eq!(hit(&mut state), DamageOutcome::Damaged { health: 1.0 });
        assert_eq!(state.health(), MAX_HEALTH - 2.0);
        assert!(state.is_alive());
    }

    #[test]
    fn test_three_hits_kill() {
        let mut state = CharacterState::new();
        hit(&mut state);
        hit(&mut state);
        assert_eq!(hit(&mut state), DamageOutcome::Killed);
        assert!(state.health() <= 0.0);
        assert!(!state.is_alive());
        assert_eq!(hit(&mut state), DamageOutcome::Ignored);
    }

    #[test]
    fn test_ineligible_source_leaves_health_unchanged() {
        let mut state = CharacterState::new();
        let outcome = state
            .apply_damage(&authority(), 1.0, ActorKind::Other, ActorKind::PlayerCharacter)
            .unwrap();
        assert_eq!(outcome, DamageOutcome::Ignored);
        assert_eq!(state.health(), MAX_HEALTH);
    }

    #[test]
    fn test_client_cannot_apply_damage() {
        let mut state = CharacterState::new();
        let result = state.apply_damage(
            &ExecutionContext::client(Some(PlayerId(1))),
            1.0,
            ActorKind::PlayerCharacter,
            ActorKind::PlayerCharacter,
        );
        assert_eq!(result, Err(GameError::UnauthorizedMutation("health")));
        assert_eq!(state.health(), MAX_HEALTH);
    }

    #[test]
    fn test_fraction_is_clamped() {
        assert_approx_eq!(health_fraction(-1.0, 3.0), 0.0);
        assert_approx_eq!(health_fraction(2.0, 3.0), 2.0 / 3.0);
        assert_approx_eq!(health_fraction(5.0, 3.0), 1.0);
        assert_eq!(health_fraction(1.0, 0.0), 0.0);
    }
}
