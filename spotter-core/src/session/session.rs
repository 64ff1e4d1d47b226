use std::sync::Arc;

use log::{debug, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::SessionUpdate;
use super::orchestrator::{Channels, Command, Orchestrator};
use super::summary::SetTally;
use crate::audio::capture::FrameSink;
use crate::audio::{CaptureFeed, CapturePipeline, PlaybackPipeline, PlaybackRenderer};
use crate::config::{AudioMode, SessionConfig};
use crate::errors::SpotterError;
use crate::live::prompt::{PromptBuilder, workout_tool_declaration};
use crate::live::{ClientMessage, LiveClient};
use crate::models::{Difficulty, Exercise, Profile, WorkoutSession};
use crate::recommendation::ExerciseCatalog;
use crate::workout::{RestTimer, WorkoutEvent, WorkoutState};

/// Caller's side of a running session.
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    updates: Option<mpsc::UnboundedReceiver<SessionUpdate>>,
    task: Option<JoinHandle<WorkoutSession>>,
    record: Option<WorkoutSession>,
    exercises: Vec<Exercise>,
    capture_feed: Option<CaptureFeed>,
    renderer: Option<PlaybackRenderer>,
}

impl SessionHandle {
    /// Recommend a workout for `profile`, connect to the agent and start the
    /// audio pipelines. Only the remote handshake is awaited.
    ///
    /// A missing microphone or speaker is fatal and closes the remote
    /// session before returning.
    pub async fn start(
        config: SessionConfig,
        profile: &Profile,
        catalog: Arc<dyn ExerciseCatalog>,
        client: &LiveClient,
    ) -> Result<Self, SpotterError> {
        config.validate()?;
        let exercises = catalog.recommend_workout(profile.goal, profile.experience);
        if exercises.is_empty() {
            return Err(SpotterError::InvalidConfig(format!(
                "no exercises for goal={} experience={}",
                profile.goal, profile.experience
            )));
        }
        info!(
            "SessionHandle::start profile={} goal={} exercises={} backend={}",
            profile.name,
            profile.goal,
            exercises.len(),
            client.backend_name()
        );

        let prompt = PromptBuilder::new(profile, &exercises);
        let setup = client.setup(prompt.system_instruction(), vec![workout_tool_declaration()]);
        let (remote, inbound) = client.connect(setup).await?;

        let playback = match config.audio_mode {
            AudioMode::Device => PlaybackPipeline::start_device(config.playback_sample_rate)
                .await
                .map(|(pipeline, played)| (pipeline, None, played)),
            AudioMode::Headless => {
                let (pipeline, renderer, played) =
                    PlaybackPipeline::headless(config.playback_sample_rate);
                Ok((pipeline, Some(renderer), played))
            }
        };
        let (playback, renderer, played) = match playback {
            Ok(parts) => parts,
            Err(e) => {
                remote.close();
                return Err(e);
            }
        };

        let sink_remote = remote.clone();
        let sink: FrameSink = Box::new(move |pcm| {
            sink_remote.send(ClientMessage::RealtimeAudio(pcm));
        });
        let capture = match config.audio_mode {
            AudioMode::Device => {
                CapturePipeline::start_device(config.frame_samples, config.capture_sample_rate, sink)
                    .await
                    .map(|pipeline| (pipeline, None))
            }
            AudioMode::Headless => {
                let (pipeline, feed) =
                    CapturePipeline::headless(config.frame_samples, config.capture_sample_rate, sink);
                Ok((pipeline, Some(feed)))
            }
        };
        let (capture, capture_feed) = match capture {
            Ok(parts) => parts,
            Err(e) => {
                remote.close();
                return Err(e);
            }
        };

        remote.send(ClientMessage::RealtimeText(prompt.kickoff()));

        let (tick_tx, ticks) = mpsc::unbounded_channel();
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands) = mpsc::unbounded_channel();

        let orchestrator = Orchestrator {
            config,
            catalog,
            remote,
            exercises: exercises.clone(),
            state: WorkoutState::started(),
            tally: SetTally::new(exercises.len()),
            completed: false,
            capture,
            playback,
            timer: RestTimer::new(tick_tx),
            updates: updates_tx,
            transcript: String::new(),
            clear_at: None,
            finish_at: None,
        };
        let task = tokio::spawn(orchestrator.run(Channels {
            commands,
            inbound,
            played,
            ticks,
        }));

        Ok(Self {
            commands: commands_tx,
            updates: Some(updates_rx),
            task: Some(task),
            record: None,
            exercises,
            capture_feed,
            renderer,
        })
    }

    /// The workout as recommended at start, before any difficulty change.
    pub fn planned_exercises(&self) -> &[Exercise] {
        &self.exercises
    }

    /// Updates stream. Can be taken once.
    pub fn take_updates(&mut self) -> Option<mpsc::UnboundedReceiver<SessionUpdate>> {
        self.updates.take()
    }

    /// Headless mode only: push microphone samples.
    pub fn capture_feed(&self) -> Option<&CaptureFeed> {
        self.capture_feed.as_ref()
    }

    /// Headless mode only: drive the playback clock.
    pub fn playback_renderer(&self) -> Option<&PlaybackRenderer> {
        self.renderer.as_ref()
    }

    fn command(&self, event: WorkoutEvent) -> bool {
        self.commands.send(Command::Event(event)).is_ok()
    }

    pub fn finish_set(&self) -> bool {
        self.command(WorkoutEvent::FinishSet)
    }

    pub fn next_exercise(&self) -> bool {
        self.command(WorkoutEvent::NextExercise)
    }

    pub fn set_difficulty(&self, difficulty: Difficulty) -> bool {
        self.command(WorkoutEvent::DifficultyChange(difficulty))
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|t| t.is_finished())
    }

    /// End the session and return its history record. Calling again returns
    /// the same record.
    pub async fn stop(&mut self) -> Result<WorkoutSession, SpotterError> {
        if let Some(record) = &self.record {
            return Ok(record.clone());
        }
        if self.commands.send(Command::Stop).is_err() {
            debug!("SessionHandle::stop loop already gone");
        }
        self.join().await
    }

    /// Wait for the session to end on its own (completion or remote close).
    pub async fn wait(&mut self) -> Result<WorkoutSession, SpotterError> {
        if let Some(record) = &self.record {
            return Ok(record.clone());
        }
        self.join().await
    }

    async fn join(&mut self) -> Result<WorkoutSession, SpotterError> {
        let task = self
            .task
            .as_mut()
            .ok_or_else(|| SpotterError::RemoteSession("session task missing".into()))?;
        let record = task.await.map_err(SpotterError::remote)?;
        self.task = None;
        self.record = Some(record.clone());
        Ok(record)
    }
}
