pub mod catalog;
pub mod engine;

pub use self::engine::RecommendationEngine;

use crate::models::{Difficulty, Exercise, Experience, Goal};

/// Exercise lookup and generation consumed by the session.
pub trait ExerciseCatalog: Send + Sync {
    fn recommend_workout(&self, goal: Goal, experience: Experience) -> Vec<Exercise>;

    /// Recompute an exercise for a difficulty tier. Must not mutate in place.
    fn adjust_for_difficulty(&self, exercise: &Exercise, difficulty: Difficulty) -> Exercise;
}
