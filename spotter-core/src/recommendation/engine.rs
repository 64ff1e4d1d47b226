use super::ExerciseCatalog;
use super::catalog::{self, CatalogEntry};
use crate::models::{Difficulty, Exercise, Experience, Goal, Targets};
use log::debug;

const MIN_SETS: u32 = 1;
const MIN_REPS: u32 = 1;
const MIN_REST_SECONDS: u32 = 15;

struct Scheme {
    exercise_ids: &'static [&'static str],
    reps: u32,
    sets: u32,
    rest_seconds: u32,
}

fn scheme_for(goal: Goal) -> Scheme {
    match goal {
        Goal::Strength => Scheme {
            exercise_ids: &[
                "goblet-squat",
                "romanian-deadlift",
                "overhead-press",
                "dumbbell-row",
                "push-up",
            ],
            reps: 5,
            sets: 4,
            rest_seconds: 120,
        },
        Goal::Hypertrophy => Scheme {
            exercise_ids: &[
                "goblet-squat",
                "dumbbell-row",
                "push-up",
                "romanian-deadlift",
                "overhead-press",
            ],
            reps: 10,
            sets: 3,
            rest_seconds: 90,
        },
        Goal::Endurance => Scheme {
            exercise_ids: &[
                "reverse-lunge",
                "push-up",
                "mountain-climber",
                "plank",
                "burpee",
            ],
            reps: 15,
            sets: 3,
            rest_seconds: 45,
        },
        Goal::WeightLoss => Scheme {
            exercise_ids: &[
                "burpee",
                "reverse-lunge",
                "mountain-climber",
                "push-up",
                "plank",
            ],
            reps: 12,
            sets: 3,
            rest_seconds: 30,
        },
    }
}

/// (exercise count, set delta) by experience.
fn volume_for(experience: Experience) -> (usize, i64) {
    match experience {
        Experience::Beginner => (3, -1),
        Experience::Intermediate => (4, 0),
        Experience::Advanced => (5, 1),
    }
}

/// (sets, reps, rest) offsets applied on top of the medium baseline.
fn offsets_for(difficulty: Difficulty) -> (i64, i64, i64) {
    match difficulty {
        Difficulty::Easy => (-1, -2, 15),
        Difficulty::Medium => (0, 0, 0),
        Difficulty::Hard => (1, 2, -15),
    }
}

fn shift(value: u32, delta: i64, floor: u32) -> u32 {
    (value as i64 + delta).max(floor as i64) as u32
}

fn build_exercise(entry: &CatalogEntry, reps: u32, sets: u32, rest_seconds: u32) -> Exercise {
    Exercise {
        id: entry.id.to_string(),
        name: entry.name.to_string(),
        muscle_group: entry.muscle_group.to_string(),
        description: entry.description.to_string(),
        target_reps: reps,
        target_sets: sets,
        rest_seconds,
        difficulty: None,
        baseline: None,
    }
}

#[derive(Debug, Default, Clone)]
pub struct RecommendationEngine;

impl RecommendationEngine {
    pub fn new() -> Self {
        RecommendationEngine
    }
}

impl ExerciseCatalog for RecommendationEngine {
    fn recommend_workout(&self, goal: Goal, experience: Experience) -> Vec<Exercise> {
        let scheme = scheme_for(goal);
        let (count, set_delta) = volume_for(experience);
        let sets = shift(scheme.sets, set_delta, MIN_SETS);

        let workout: Vec<Exercise> = scheme
            .exercise_ids
            .iter()
            .filter_map(|id| catalog::find(id))
            .take(count)
            .map(|entry| {
                // Conditioning moves get a few extra reps on strength days.
                let reps = if goal == Goal::Strength && entry.conditioning {
                    scheme.reps * 2
                } else {
                    scheme.reps
                };
                build_exercise(entry, reps, sets, scheme.rest_seconds)
            })
            .collect();

        debug!(
            "recommend_workout goal={} experience={} -> {} exercises",
            goal,
            experience,
            workout.len()
        );
        workout
    }

    fn adjust_for_difficulty(&self, exercise: &Exercise, difficulty: Difficulty) -> Exercise {
        // Tiers are always applied to the untiered targets, captured on the
        // first adjustment, so clamping at a floor never leaks into the next one.
        let base = exercise.baseline.unwrap_or(Targets {
            sets: exercise.target_sets,
            reps: exercise.target_reps,
            rest_seconds: exercise.rest_seconds,
        });

        let (d_sets, d_reps, d_rest) = offsets_for(difficulty);
        let adjusted = Exercise {
            target_sets: shift(base.sets, d_sets, MIN_SETS),
            target_reps: shift(base.reps, d_reps, MIN_REPS),
            rest_seconds: shift(base.rest_seconds, d_rest, MIN_REST_SECONDS),
            difficulty: Some(difficulty),
            baseline: Some(base),
            ..exercise.clone()
        };
        debug!(
            "adjust_for_difficulty {} -> {} ({} x {})",
            exercise.id, difficulty, adjusted.target_sets, adjusted.target_reps
        );
        adjusted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strength_beginner_has_exercises() {
        let engine = RecommendationEngine::new();
        let workout = engine.recommend_workout(Goal::Strength, Experience::Beginner);
        assert!(!workout.is_empty());
        assert_eq!(workout.len(), 3);
        assert!(workout.iter().all(|e| e.target_sets == 3 && e.rest_seconds == 120));
    }

    #[test]
    fn every_goal_and_experience_yields_a_workout() {
        let engine = RecommendationEngine::new();
        for goal in [Goal::Strength, Goal::Hypertrophy, Goal::Endurance, Goal::WeightLoss] {
            for exp in [Experience::Beginner, Experience::Intermediate, Experience::Advanced] {
                let workout = engine.recommend_workout(goal, exp);
                assert!(!workout.is_empty(), "{goal} {exp}");
                assert!(workout.iter().all(|e| e.target_sets >= 1 && e.target_reps >= 1));
            }
        }
    }

    #[test]
    fn difficulty_is_monotone() {
        let engine = RecommendationEngine::new();
        let base = engine.recommend_workout(Goal::Hypertrophy, Experience::Intermediate)[0].clone();
        let easy = engine.adjust_for_difficulty(&base, Difficulty::Easy);
        let medium = engine.adjust_for_difficulty(&base, Difficulty::Medium);
        let hard = engine.adjust_for_difficulty(&base, Difficulty::Hard);

        assert!(easy.target_reps < medium.target_reps && medium.target_reps < hard.target_reps);
        assert!(easy.target_sets < medium.target_sets && medium.target_sets < hard.target_sets);
        assert_eq!(hard.difficulty, Some(Difficulty::Hard));
        assert_eq!(medium.target_reps, base.target_reps);
    }

    #[test]
    fn repeated_adjustments_do_not_compound() {
        let engine = RecommendationEngine::new();
        let base = engine.recommend_workout(Goal::Strength, Experience::Advanced)[1].clone();
        let once = engine.adjust_for_difficulty(&base, Difficulty::Hard);
        let twice = engine.adjust_for_difficulty(&once, Difficulty::Hard);
        assert_eq!(once, twice);

        let back = engine.adjust_for_difficulty(&twice, Difficulty::Medium);
        assert_eq!(back.target_reps, base.target_reps);
        assert_eq!(back.target_sets, base.target_sets);
        assert_eq!(back.rest_seconds, base.rest_seconds);
    }

    #[test]
    fn tier_changes_at_the_floors_do_not_drift() {
        let engine = RecommendationEngine::new();
        let mut base = engine.recommend_workout(Goal::WeightLoss, Experience::Beginner)[0].clone();
        base.target_sets = 1;
        base.rest_seconds = 20;

        let easy = engine.adjust_for_difficulty(&base, Difficulty::Easy);
        assert_eq!(easy.target_sets, 1);
        let medium = engine.adjust_for_difficulty(&easy, Difficulty::Medium);
        assert_eq!(medium.target_sets, 1);

        let hard = engine.adjust_for_difficulty(&base, Difficulty::Hard);
        assert_eq!(hard.rest_seconds, MIN_REST_SECONDS);
        let medium = engine.adjust_for_difficulty(&hard, Difficulty::Medium);
        assert_eq!((medium.target_sets, medium.rest_seconds), (1, 20));

        let mut current = base.clone();
        for d in [Difficulty::Easy, Difficulty::Hard, Difficulty::Easy, Difficulty::Hard] {
            current = engine.adjust_for_difficulty(&current, d);
        }
        assert_eq!(current, engine.adjust_for_difficulty(&base, Difficulty::Hard));
    }
}
