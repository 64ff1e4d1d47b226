//! Typed view of the agent's `updateWorkoutState` calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::SpotterError;
use crate::live::ToolCall;
use crate::live::prompt::TOOL_NAME;
use crate::models::Difficulty;
use crate::workout::WorkoutEvent;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum WorkoutAction {
    #[serde(rename = "finish_set")]
    FinishSet,
    #[serde(rename = "next_exercise")]
    NextExercise,
    #[serde(rename = "set_difficulty")]
    SetDifficulty { value: String },
}

impl WorkoutAction {
    pub fn event(&self) -> Result<WorkoutEvent, SpotterError> {
        match self {
            WorkoutAction::FinishSet => Ok(WorkoutEvent::FinishSet),
            WorkoutAction::NextExercise => Ok(WorkoutEvent::NextExercise),
            WorkoutAction::SetDifficulty { value } => value
                .parse::<Difficulty>()
                .map(WorkoutEvent::DifficultyChange)
                .map_err(|e| SpotterError::ToolCall {
                    name: TOOL_NAME.to_string(),
                    reason: e.to_string(),
                }),
        }
    }
}

/// Resolve a call to a workout event. Anything that does not name a known
/// function and action is a `ToolCall` error.
pub fn parse_tool_call(call: &ToolCall) -> Result<WorkoutEvent, SpotterError> {
    let reject = |reason: String| SpotterError::ToolCall {
        name: call.name.clone(),
        reason,
    };
    if call.name != TOOL_NAME {
        return Err(reject("unknown function".to_string()));
    }

    let args: serde_json::Map<String, Value> = call
        .args
        .iter()
        .map(|(k, v)| {
            let v = if k == "action" {
                v.trim().to_lowercase()
            } else {
                v.clone()
            };
            (k.clone(), Value::String(v))
        })
        .collect();
    let action: WorkoutAction =
        serde_json::from_value(Value::Object(args)).map_err(|e| reject(e.to_string()))?;
    action.event()
}
