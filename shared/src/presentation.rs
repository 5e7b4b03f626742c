//! Fire-and-forget hooks into whatever renders the match.

use crate::actor::ActorId;
use crate::score::MatchScore;
use glam::Vec3;

/// Handle to a beam effect asset. A weapon without one spawns no trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectAsset(pub String);

pub trait PresentationSink {
    /// Draws a beam from `origin` to `end`.
    fn spawn_trail(&mut self, effect: &EffectAsset, origin: Vec3, end: Vec3);

    /// Health bar update for the locally controlled character, in `[0, 1]`.
    fn health_changed(&mut self, fraction: f32);

    fn score_changed(&mut self, score: MatchScore);

    fn hide_character(&mut self, character: ActorId);
}

/// Sink that renders nothing, for dedicated servers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPresentation;

impl PresentationSink for NullPresentation {
    fn spawn_trail(&mut self, _effect: &EffectAsset, _origin: Vec3, _end: Vec3) {}
    fn health_changed(&mut self, _fraction: f32) {}
    fn score_changed(&mut self, _score: MatchScore) {}
    fn hide_character(&mut self, _character: ActorId) {}
}

/// Records every call, for tests.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecordingPresentation {
    pub trails: Vec<(Vec3, Vec3)>,
    pub health: Vec<f32>,
    pub scores: Vec<MatchScore>,
    pub hidden: Vec<ActorId>,
}

impl PresentationSink for RecordingPresentation {
    fn spawn_trail(&mut self, _effect: &EffectAsset, origin: Vec3, end: Vec3) {
        self.trails.push((origin, end));
    }

    fn health_changed(&mut self, fraction: f32) {
        self.health.push(fraction);
    }

    fn score_changed(&mut self, score: MatchScore) {
        self.scores.push(score);
    }

    fn hide_character(&mut self, character: ActorId) {
        self.hidden.push(character);
    }
}
