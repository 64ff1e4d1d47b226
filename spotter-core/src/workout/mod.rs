//! Workout progression and the rest countdown that drives it.

pub mod state;
pub mod timer;

pub use state::{Phase, Transition, WorkoutEvent, WorkoutState, next};
pub use timer::{RestTimer, TimerTick};
