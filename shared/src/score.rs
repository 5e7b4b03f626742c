use crate::context::ExecutionContext;
use crate::error::GameError;
use log::info;
use serde::{Deserialize, Serialize};

/// Kill counters for the two seats. Only ever incremented, on the authority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchScore {
    pub player1_score: u32,
    pub player2_score: u32,
}

impl MatchScore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_kill(
        &mut self,
        ctx: &ExecutionContext,
        scoring_player_is_player1: bool,
    ) -> Result<(), GameError> {
        ctx.require_authority("score")?;

        if scoring_player_is_player1 {
            self.player1_score += 1;
        } else {
            self.player2_score += 1;
        }
        info!(
            "Score is now {} - {}",
            self.player1_score, self.player2_score
        );
        Ok(())
    }
}
