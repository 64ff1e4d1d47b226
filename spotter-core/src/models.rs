use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::SpotterError;

macro_rules! string_enum {
    ($name:ident, $label:literal { $($variant:ident => $text:literal $(| $alias:literal)*),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = SpotterError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
                    $($text $(| $alias)* => Ok($name::$variant),)+
                    other => Err(SpotterError::InvalidConfig(format!(
                        "unknown {}: {}",
                        $label, other
                    ))),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    Strength,
    Hypertrophy,
    Endurance,
    WeightLoss,
}

string_enum!(Goal, "goal" {
    Strength => "strength",
    Hypertrophy => "hypertrophy" | "muscle",
    Endurance => "endurance",
    WeightLoss => "weight_loss" | "fat_loss",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Experience {
    Beginner,
    Intermediate,
    Advanced,
}

string_enum!(Experience, "experience" {
    Beginner => "beginner",
    Intermediate => "intermediate",
    Advanced => "advanced",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoachStyle {
    Supportive,
    DrillSergeant,
    Analytical,
}

string_enum!(CoachStyle, "coach style" {
    Supportive => "supportive",
    DrillSergeant => "drill_sergeant" | "drill",
    Analytical => "analytical",
});

/// Difficulty tiers, ordered from easiest to hardest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

string_enum!(Difficulty, "difficulty" {
    Easy => "easy" | "easier",
    Medium => "medium" | "normal",
    Hard => "hard" | "harder",
});

/// Per-user configuration. Owned by the caller, read-only to the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub age: u32,
    pub weight_kg: f32,
    pub height_cm: f32,
    pub goal: Goal,
    pub experience: Experience,
    pub coach_style: CoachStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub muscle_group: String,
    pub description: String,
    pub target_reps: u32,
    pub target_sets: u32,
    pub rest_seconds: u32,
    pub difficulty: Option<Difficulty>,
    /// Targets before any difficulty tier was applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<Targets>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Targets {
    pub sets: u32,
    pub reps: u32,
    pub rest_seconds: u32,
}

impl fmt::Display for Exercise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} x {} reps, {}s rest",
            self.name, self.target_sets, self.target_reps, self.rest_seconds
        )?;
        if let Some(d) = self.difficulty {
            write!(f, " [{}]", d)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetLog {
    pub reps: u32,
    pub weight: Option<f32>,
    pub rpe: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseLog {
    pub exercise_id: String,
    pub sets: Vec<SetLog>,
}

/// History record. Built once when a session ends and never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSession {
    pub id: String,
    pub date: String,
    pub exercises: Vec<ExerciseLog>,
}

impl WorkoutSession {
    pub fn total_sets(&self) -> usize {
        self.exercises.iter().map(|e| e.sets.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_parse_loosely() {
        assert_eq!("Drill Sergeant".parse::<CoachStyle>().unwrap(), CoachStyle::DrillSergeant);
        assert_eq!("weight-loss".parse::<Goal>().unwrap(), Goal::WeightLoss);
        assert_eq!("HARD".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("extreme".parse::<Difficulty>().is_err());
    }

    #[test]
    fn difficulty_is_ordered() {
        assert!(Difficulty::Easy < Difficulty::Medium);
        assert!(Difficulty::Medium < Difficulty::Hard);
    }

    #[test]
    fn profile_round_trips_through_json() {
        let profile = Profile {
            name: "Sam".into(),
            age: 31,
            weight_kg: 72.5,
            height_cm: 178.0,
            goal: Goal::Hypertrophy,
            experience: Experience::Intermediate,
            coach_style: CoachStyle::Analytical,
        };
        let json = serde_json::to_string(&profile).unwrap();
        assert!(json.contains("\"coach_style\":\"analytical\""));
        let back: Profile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, profile);
    }
}
