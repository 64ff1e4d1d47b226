//! JSON persistence for the profile and session history.

use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

use spotter::models::{Profile, WorkoutSession};

const PROFILE_FILE: &str = "profile.json";
const HISTORY_FILE: &str = "history.json";
const LOG_FILE: &str = "spotter.log";

pub struct Store {
    dir: PathBuf,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(value))
}

/// Write through a sibling temp file so a crash never leaves half a file.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let raw = serde_json::to_string_pretty(value)?;
    fs::write(&tmp, raw).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

impl Store {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        debug!("Store::open dir={}", dir.display());
        Ok(Self { dir })
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }

    pub fn load_profile(&self) -> Result<Option<Profile>> {
        read_json(&self.dir.join(PROFILE_FILE))
    }

    pub fn save_profile(&self, profile: &Profile) -> Result<()> {
        write_json(&self.dir.join(PROFILE_FILE), profile)
    }

    pub fn load_history(&self) -> Result<Vec<WorkoutSession>> {
        Ok(read_json(&self.dir.join(HISTORY_FILE))?.unwrap_or_default())
    }

    /// Append one record. Returns the new history length.
    pub fn append_history(&self, session: &WorkoutSession) -> Result<usize> {
        let mut history = self.load_history()?;
        history.push(session.clone());
        write_json(&self.dir.join(HISTORY_FILE), &history)?;
        debug!(
            "Store::append_history id={} total={}",
            session.id,
            history.len()
        );
        Ok(history.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spotter::models::{CoachStyle, Experience, ExerciseLog, Goal, SetLog};

    fn profile() -> Profile {
        Profile {
            name: "Jo".into(),
            age: 40,
            weight_kg: 70.0,
            height_cm: 165.0,
            goal: Goal::WeightLoss,
            experience: Experience::Advanced,
            coach_style: CoachStyle::DrillSergeant,
        }
    }

    fn session(id: &str) -> WorkoutSession {
        WorkoutSession {
            id: id.into(),
            date: "2026-01-02T03:04:05+00:00".into(),
            exercises: vec![ExerciseLog {
                exercise_id: "burpee".into(),
                sets: vec![SetLog {
                    reps: 12,
                    weight: None,
                    rpe: None,
                }],
            }],
        }
    }

    #[test]
    fn profile_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("data")).unwrap();
        assert!(store.load_profile().unwrap().is_none());
        store.save_profile(&profile()).unwrap();
        assert_eq!(store.load_profile().unwrap(), Some(profile()));
    }

    #[test]
    fn history_appends_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        assert!(store.load_history().unwrap().is_empty());
        assert_eq!(store.append_history(&session("a")).unwrap(), 1);
        assert_eq!(store.append_history(&session("b")).unwrap(), 2);

        let ids: Vec<String> = store
            .load_history()
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(!dir.path().join("history.json.tmp").exists());
    }

    #[test]
    fn corrupt_history_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        fs::write(dir.path().join(HISTORY_FILE), "not json").unwrap();
        assert!(store.load_history().is_err());
    }
}
