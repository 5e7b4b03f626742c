//! Headless presentation: effects and HUD changes go to the log.

use glam::Vec3;
use log::info;
use shared::presentation::{EffectAsset, PresentationSink};
use shared::{ActorId, MatchScore};

#[derive(Debug, Default)]
pub struct LogPresentation {
    pub trails_drawn: u32,
}

impl PresentationSink for LogPresentation {
    fn spawn_trail(&mut self, effect: &EffectAsset, origin: Vec3, end: Vec3) {
        self.trails_drawn += 1;
        info!(
            "[{}] beam {:.0} -> {:.0} ({:.0} units)",
            effect.0,
            origin,
            end,
            origin.distance(end)
        );
    }

    fn health_changed(&mut self, fraction: f32) {
        let filled = (fraction * 10.0).round() as usize;
        info!(
            "Health [{}{}] {:.0}%",
            "#".repeat(filled),
            "-".repeat(10 - filled.min(10)),
            fraction * 100.0
        );
    }

    fn score_changed(&mut self, score: MatchScore) {
        info!("Score {} : {}", score.player1_score, score.player2_score);
    }

    fn hide_character(&mut self, character: ActorId) {
        info!("{} hidden", character);
    }
}
