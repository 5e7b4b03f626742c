use crate::actor::{ActorId, PlayerId};
use crate::level::SpawnTag;
use thiserror::Error;

/// Failures raised by gameplay-state operations.
///
/// Presentation never produces one of these: a missing effect or a failed
/// cosmetic trace degrades to "no visual" instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("player id {0} is outside the fixed two-player match")]
    InvalidIdentity(PlayerId),

    #[error("level has no spawn marker tagged {0:?}")]
    MissingSpawnPoint(SpawnTag),

    #[error("{0} no longer exists")]
    StaleActorReference(ActorId),

    #[error("non-authority process attempted to mutate {0}")]
    UnauthorizedMutation(&'static str),

    #[error("match already has two players")]
    MatchFull,
}
