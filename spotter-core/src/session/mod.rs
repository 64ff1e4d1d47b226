//! Session module for running a live coached workout.
//!
//! `SessionHandle::start` connects to the remote agent, opens the audio
//! pipelines and hands everything to a single orchestrator loop. The handle
//! feeds local controls into that loop and receives `SessionUpdate`s back.

mod orchestrator;
mod session;
pub mod summary;
pub mod tools;

pub use session::SessionHandle;

use serde::Serialize;

use crate::models::{Exercise, WorkoutSession};
use crate::workout::{Phase, WorkoutState};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub state: WorkoutState,
    pub phase: Phase,
    pub exercises: Vec<Exercise>,
}

impl Snapshot {
    pub fn current_exercise(&self) -> Option<&Exercise> {
        self.exercises.get(self.state.current_exercise_index)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    State(Snapshot),
    /// Agent speech transcribed so far in the current turn.
    Transcript(String),
    TranscriptCleared,
    AgentSpeaking(bool),
    /// Seconds of rest remaining.
    RestTick(u32),
    WorkoutComplete,
    Error(String),
    Ended(WorkoutSession),
}
