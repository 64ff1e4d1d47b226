//! Workout progression as a pure transition function.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::models::{Difficulty, Exercise};
use crate::recommendation::ExerciseCatalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutState {
    pub active: bool,
    pub current_exercise_index: usize,
    pub current_set: u32,
    pub timer: u32,
    pub is_resting: bool,
}

impl Default for WorkoutState {
    fn default() -> Self {
        Self {
            active: false,
            current_exercise_index: 0,
            current_set: 1,
            timer: 0,
            is_resting: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Lifting,
    Resting,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkoutEvent {
    FinishSet,
    NextExercise,
    DifficultyChange(Difficulty),
}

/// Side effect the caller owes after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Start a rest timer for this many seconds.
    StartRest(u32),
    /// Moved to the next exercise; any running rest timer is now stale.
    Advanced,
    /// The final set of the final exercise is done.
    Completed,
    /// The exercise at this index was replaced.
    DifficultyChanged(usize),
    NoOp,
}

impl WorkoutState {
    /// State at session start: first exercise, first set.
    pub fn started() -> Self {
        Self {
            active: true,
            ..Self::default()
        }
    }

    pub fn phase(&self, completed: bool) -> Phase {
        match (self.active, completed, self.is_resting) {
            (false, true, _) => Phase::Completed,
            (false, false, _) => Phase::Idle,
            (true, _, true) => Phase::Resting,
            (true, _, false) => Phase::Lifting,
        }
    }

    /// One rest-timer tick. Returns true when rest just ended.
    pub fn tick(&mut self) -> bool {
        if !self.is_resting {
            return false;
        }
        self.timer = self.timer.saturating_sub(1);
        if self.timer == 0 {
            self.is_resting = false;
            return true;
        }
        false
    }
}

/// Apply `event`. `exercises` is only modified by a difficulty change, which
/// replaces the current entry with the catalog's recomputed one.
pub fn next(
    state: &mut WorkoutState,
    exercises: &mut [Exercise],
    event: WorkoutEvent,
    catalog: &dyn ExerciseCatalog,
) -> Transition {
    if !state.active {
        debug!("next event={:?} ignored, workout inactive", event);
        return Transition::NoOp;
    }
    let Some(current) = exercises.get(state.current_exercise_index) else {
        return Transition::NoOp;
    };
    let is_last = state.current_exercise_index + 1 >= exercises.len();

    let outcome = match event {
        WorkoutEvent::FinishSet if state.current_set < current.target_sets => {
            state.current_set += 1;
            state.timer = current.rest_seconds;
            state.is_resting = true;
            Transition::StartRest(current.rest_seconds)
        }
        WorkoutEvent::FinishSet | WorkoutEvent::NextExercise => {
            if is_last {
                state.active = false;
                state.timer = 0;
                state.is_resting = false;
                Transition::Completed
            } else {
                state.current_exercise_index += 1;
                state.current_set = 1;
                state.timer = 0;
                state.is_resting = false;
                Transition::Advanced
            }
        }
        WorkoutEvent::DifficultyChange(difficulty) => {
            let index = state.current_exercise_index;
            let adjusted = catalog.adjust_for_difficulty(current, difficulty);
            exercises[index] = adjusted;
            Transition::DifficultyChanged(index)
        }
    };

    debug!(
        "next event={:?} -> {:?} (exercise={}, set={}, resting={})",
        event, outcome, state.current_exercise_index, state.current_set, state.is_resting
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Experience, Goal};
    use crate::recommendation::RecommendationEngine;

    fn exercise(id: &str, sets: u32, rest: u32) -> Exercise {
        Exercise {
            id: id.into(),
            name: id.into(),
            muscle_group: "legs".into(),
            description: String::new(),
            target_reps: 10,
            target_sets: sets,
            rest_seconds: rest,
            difficulty: None,
            baseline: None,
        }
    }

    #[test]
    fn finish_set_enters_rest_when_sets_remain() {
        let engine = RecommendationEngine::new();
        let mut exercises = vec![exercise("a", 3, 60), exercise("b", 3, 45)];
        for set in 1..3 {
            let mut state = WorkoutState {
                current_set: set,
                ..WorkoutState::started()
            };
            let t = next(&mut state, &mut exercises, WorkoutEvent::FinishSet, &engine);
            assert_eq!(t, Transition::StartRest(60));
            assert_eq!(state.current_set, set + 1);
            assert_eq!(state.timer, 60);
            assert!(state.is_resting);
            assert_eq!(state.current_exercise_index, 0);
        }
    }

    #[test]
    fn finish_last_set_advances() {
        let engine = RecommendationEngine::new();
        let mut exercises = vec![exercise("a", 2, 60), exercise("b", 3, 45)];
        let mut state = WorkoutState {
            current_set: 2,
            timer: 12,
            is_resting: true,
            ..WorkoutState::started()
        };
        let t = next(&mut state, &mut exercises, WorkoutEvent::FinishSet, &engine);
        assert_eq!(t, Transition::Advanced);
        assert_eq!(
            state,
            WorkoutState {
                current_exercise_index: 1,
                ..WorkoutState::started()
            }
        );
    }

    #[test]
    fn completion_happens_once() {
        let engine = RecommendationEngine::new();
        let mut exercises = vec![exercise("a", 1, 60)];
        let mut state = WorkoutState::started();

        let t = next(&mut state, &mut exercises, WorkoutEvent::FinishSet, &engine);
        assert_eq!(t, Transition::Completed);
        assert!(!state.active);
        assert!(!state.is_resting);
        assert_eq!(state.phase(true), Phase::Completed);

        let after = state;
        let t = next(&mut state, &mut exercises, WorkoutEvent::FinishSet, &engine);
        assert_eq!(t, Transition::NoOp);
        assert_eq!(state, after);
    }

    #[test]
    fn strength_beginner_single_set_completes_directly() {
        let engine = RecommendationEngine::new();
        let workout = engine.recommend_workout(Goal::Strength, Experience::Beginner);
        assert!(!workout.is_empty());

        let mut exercises = vec![Exercise {
            target_sets: 1,
            ..workout[0].clone()
        }];
        let mut state = WorkoutState::started();
        let t = next(&mut state, &mut exercises, WorkoutEvent::FinishSet, &engine);
        assert_eq!(t, Transition::Completed);
        assert!(!state.active);
        assert!(!state.is_resting);
        assert_eq!(state.timer, 0);
    }

    #[test]
    fn next_exercise_skips_remaining_sets() {
        let engine = RecommendationEngine::new();
        let mut exercises = vec![exercise("a", 4, 60), exercise("b", 3, 45)];
        let mut state = WorkoutState::started();
        next(&mut state, &mut exercises, WorkoutEvent::FinishSet, &engine);

        let t = next(&mut state, &mut exercises, WorkoutEvent::NextExercise, &engine);
        assert_eq!(t, Transition::Advanced);
        assert_eq!(state.current_exercise_index, 1);
        assert_eq!(state.current_set, 1);
        assert!(!state.is_resting);

        let t = next(&mut state, &mut exercises, WorkoutEvent::NextExercise, &engine);
        assert_eq!(t, Transition::Completed);
    }

    #[test]
    fn difficulty_change_replaces_only_current_exercise() {
        let engine = RecommendationEngine::new();
        let mut exercises = engine.recommend_workout(Goal::Hypertrophy, Experience::Intermediate);
        let before = exercises.clone();
        let mut state = WorkoutState {
            current_exercise_index: 1,
            current_set: 2,
            timer: 30,
            is_resting: true,
            ..WorkoutState::started()
        };
        let state_before = state;

        let t = next(
            &mut state,
            &mut exercises,
            WorkoutEvent::DifficultyChange(Difficulty::Hard),
            &engine,
        );
        assert_eq!(t, Transition::DifficultyChanged(1));
        assert_eq!(state, state_before);
        assert_eq!(exercises[1], engine.adjust_for_difficulty(&before[1], Difficulty::Hard));
        for (i, (a, b)) in exercises.iter().zip(&before).enumerate() {
            if i != 1 {
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn tick_clears_resting_at_zero() {
        let mut state = WorkoutState {
            timer: 3,
            is_resting: true,
            ..WorkoutState::started()
        };
        assert!(!state.tick());
        assert!(!state.tick());
        assert!(state.tick());
        assert_eq!(state.timer, 0);
        assert!(!state.is_resting);
        assert!(!state.tick());
        assert_eq!(state.phase(false), Phase::Lifting);
    }
}
