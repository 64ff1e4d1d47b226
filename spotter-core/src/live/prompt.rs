//! System instruction and tool schema for the coaching conversation.

use log::debug;
use serde_json::{Value, json};

use crate::models::{CoachStyle, Exercise, Profile};
use crate::workout::WorkoutState;

pub const TOOL_NAME: &str = "updateWorkoutState";

pub const ACTION_FINISH_SET: &str = "finish_set";
pub const ACTION_NEXT_EXERCISE: &str = "next_exercise";
pub const ACTION_SET_DIFFICULTY: &str = "set_difficulty";

/// The single function the agent may call to move the workout along.
pub fn workout_tool_declaration() -> Value {
    json!({
        "name": TOOL_NAME,
        "description": "Update the live workout. Call finish_set when the user says they completed a set, \
next_exercise when they want to skip ahead, set_difficulty when they ask for an easier or harder workout.",
        "parameters": {
            "type": "OBJECT",
            "properties": {
                "action": {
                    "type": "STRING",
                    "enum": [ACTION_FINISH_SET, ACTION_NEXT_EXERCISE, ACTION_SET_DIFFICULTY],
                    "description": "What happened."
                },
                "value": {
                    "type": "STRING",
                    "description": "For set_difficulty only: easy, medium or hard."
                }
            },
            "required": ["action"]
        }
    })
}

fn style_block(style: CoachStyle) -> &'static str {
    match style {
        CoachStyle::Supportive => {
            "You are a warm, encouraging personal trainer. Celebrate effort, keep the tone positive \
and reassure the user when a set is hard."
        }
        CoachStyle::DrillSergeant => {
            "You are a loud, no-nonsense drill sergeant. Short commands, high energy, \
no excuses accepted. Never insult the user."
        }
        CoachStyle::Analytical => {
            "You are a precise strength coach. Focus on form cues, tempo and the numbers: \
sets, reps and rest."
        }
    }
}

pub struct PromptBuilder<'a> {
    profile: &'a Profile,
    exercises: &'a [Exercise],
}

impl<'a> PromptBuilder<'a> {
    pub fn new(profile: &'a Profile, exercises: &'a [Exercise]) -> Self {
        debug!(
            "PromptBuilder::new style={} exercises={}",
            profile.coach_style,
            exercises.len()
        );
        Self { profile, exercises }
    }

    fn plan_block(&self) -> String {
        let mut block = String::new();
        for (i, ex) in self.exercises.iter().enumerate() {
            block.push_str(&format!("{}. {}\n", i + 1, ex));
        }
        block
    }

    pub fn system_instruction(&self) -> String {
        let p = self.profile;
        format!(
            "{style}\n\n\
The user is {name}, {age} years old, {weight:.1} kg, {height:.0} cm. \
Goal: {goal}. Experience: {experience}.\n\n\
Today's workout:\n{plan}\n\
Guide the user through each exercise set by set. Keep replies short, they are spoken aloud \
while the user is training. When the user finishes a set, skips an exercise or asks for a \
different difficulty, call {tool} with the matching action. Local state is authoritative: \
when you receive a status update, trust it over your own count.",
            style = style_block(p.coach_style),
            name = p.name,
            age = p.age,
            weight = p.weight_kg,
            height = p.height_cm,
            goal = p.goal,
            experience = p.experience,
            plan = self.plan_block(),
            tool = TOOL_NAME,
        )
    }

    /// First message after the handshake; asks the agent to open the session.
    pub fn kickoff(&self) -> String {
        match self.exercises.first() {
            Some(first) => format!(
                "I'm ready to start. First up is {}: {} sets of {} reps. {}",
                first.name, first.target_sets, first.target_reps, first.description
            ),
            None => "I'm ready to start.".to_string(),
        }
    }
}

/// Advisory status sent after local state changes.
pub fn status_update(state: &WorkoutState, exercises: &[Exercise]) -> String {
    match exercises.get(state.current_exercise_index) {
        Some(ex) if state.active => format!(
            "Status update: exercise {} of {} is {}, set {} of {}, {} reps, {}s rest{}.",
            state.current_exercise_index + 1,
            exercises.len(),
            ex.name,
            state.current_set,
            ex.target_sets,
            ex.target_reps,
            ex.rest_seconds,
            ex.difficulty
                .map(|d| format!(", difficulty {}", d))
                .unwrap_or_default()
        ),
        _ => "Status update: the workout is complete.".to_string(),
    }
}
