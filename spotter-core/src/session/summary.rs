//! History record built when a session ends.

use chrono::{DateTime, Utc};
use log::debug;
use uuid::Uuid;

use crate::models::{Exercise, ExerciseLog, SetLog, WorkoutSession};

/// Finished-set counts per exercise index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetTally {
    counts: Vec<u32>,
}

impl SetTally {
    pub fn new(exercises: usize) -> Self {
        Self {
            counts: vec![0; exercises],
        }
    }

    pub fn record(&mut self, index: usize) {
        if let Some(count) = self.counts.get_mut(index) {
            *count += 1;
        }
    }

    pub fn get(&self, index: usize) -> u32 {
        self.counts.get(index).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }
}

/// Exercises with at least one finished set, each set logged at the
/// exercise's target reps. Reps are not counted live, and weight and
/// perceived exertion are never collected.
pub fn build_history(
    exercises: &[Exercise],
    tally: &SetTally,
    finished_at: DateTime<Utc>,
) -> WorkoutSession {
    let logs: Vec<ExerciseLog> = exercises
        .iter()
        .enumerate()
        .filter(|(i, _)| tally.get(*i) > 0)
        .map(|(i, ex)| ExerciseLog {
            exercise_id: ex.id.clone(),
            sets: (0..tally.get(i))
                .map(|_| SetLog {
                    reps: ex.target_reps,
                    weight: None,
                    rpe: None,
                })
                .collect(),
        })
        .collect();

    let session = WorkoutSession {
        id: Uuid::new_v4().to_string(),
        date: finished_at.to_rfc3339(),
        exercises: logs,
    };
    debug!(
        "build_history id={} exercises={} sets={}",
        session.id,
        session.exercises.len(),
        session.total_sets()
    );
    session
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn exercise(id: &str, reps: u32) -> Exercise {
        Exercise {
            id: id.into(),
            name: id.into(),
            muscle_group: "core".into(),
            description: String::new(),
            target_reps: reps,
            target_sets: 3,
            rest_seconds: 30,
            difficulty: None,
            baseline: None,
        }
    }

    #[test]
    fn only_attempted_exercises_are_logged() {
        let exercises = vec![exercise("a", 8), exercise("b", 12), exercise("c", 5)];
        let mut tally = SetTally::new(3);
        tally.record(0);
        tally.record(0);
        tally.record(2);
        tally.record(7);
        assert_eq!(tally.total(), 3);

        let at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();
        let record = build_history(&exercises, &tally, at);
        assert_eq!(record.date, "2026-03-14T09:30:00+00:00");
        assert_eq!(record.exercises.len(), 2);
        assert_eq!(record.exercises[0].exercise_id, "a");
        assert_eq!(record.exercises[0].sets.len(), 2);
        assert!(record.exercises[0].sets.iter().all(|s| s.reps == 8 && s.weight.is_none()));
        assert_eq!(record.exercises[1].exercise_id, "c");
        assert_eq!(record.total_sets(), 3);
        assert!(Uuid::parse_str(&record.id).is_ok());
    }

    #[test]
    fn empty_session_has_no_exercises() {
        let record = build_history(&[exercise("a", 8)], &SetTally::new(1), Utc::now());
        assert!(record.exercises.is_empty());
    }
}
