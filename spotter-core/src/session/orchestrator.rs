//! The single loop that owns a live session.
//!
//! Local commands, inbound server events, playback completions, rest-timer
//! ticks and the two deadlines (transcript clear, completion grace) are all
//! handled here one at a time, so workout state and playback scheduling never
//! race.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};

use super::summary::{SetTally, build_history};
use super::tools::parse_tool_call;
use super::{SessionUpdate, Snapshot};
use crate::audio::codec::{decode_audio_data, decode_base64};
use crate::audio::playback::SegmentId;
use crate::audio::{CapturePipeline, PlaybackPipeline};
use crate::config::SessionConfig;
use crate::errors::SpotterError;
use crate::live::prompt::status_update;
use crate::live::{ClientMessage, RemoteSession, ServerEvent, ToolCall};
use crate::models::{Exercise, WorkoutSession};
use crate::recommendation::ExerciseCatalog;
use crate::workout::{self, RestTimer, TimerTick, Transition, WorkoutEvent, WorkoutState};

#[derive(Debug)]
pub(crate) enum Command {
    Event(WorkoutEvent),
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Local,
    Remote,
}

enum Flow {
    Continue,
    Stop,
}

pub(crate) struct Channels {
    pub commands: mpsc::UnboundedReceiver<Command>,
    pub inbound: mpsc::UnboundedReceiver<ServerEvent>,
    pub played: mpsc::UnboundedReceiver<SegmentId>,
    pub ticks: mpsc::UnboundedReceiver<TimerTick>,
}

pub(crate) struct Orchestrator {
    pub config: SessionConfig,
    pub catalog: Arc<dyn ExerciseCatalog>,
    pub remote: RemoteSession,
    pub exercises: Vec<Exercise>,
    pub state: WorkoutState,
    pub tally: SetTally,
    pub completed: bool,
    pub capture: CapturePipeline,
    pub playback: PlaybackPipeline,
    pub timer: RestTimer,
    pub updates: mpsc::UnboundedSender<SessionUpdate>,
    pub transcript: String,
    pub clear_at: Option<Instant>,
    pub finish_at: Option<Instant>,
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

impl Orchestrator {
    pub async fn run(mut self, mut channels: Channels) -> WorkoutSession {
        info!(
            "session loop started exercises={} first={}",
            self.exercises.len(),
            self.exercises.first().map(|e| e.id.as_str()).unwrap_or("-")
        );
        self.publish_state();

        loop {
            let flow = tokio::select! {
                command = channels.commands.recv() => match command {
                    Some(Command::Event(event)) => {
                        self.apply(event, Origin::Local);
                        Flow::Continue
                    }
                    Some(Command::Stop) => {
                        info!("session stop requested");
                        Flow::Stop
                    }
                    None => {
                        debug!("session handle dropped");
                        Flow::Stop
                    }
                },
                event = channels.inbound.recv() => match event {
                    Some(event) => self.handle_server_event(event),
                    None => {
                        info!("remote event stream ended");
                        Flow::Stop
                    }
                },
                Some(id) = channels.played.recv() => {
                    self.on_segment_played(id);
                    Flow::Continue
                }
                Some(tick) = channels.ticks.recv() => {
                    self.on_tick(tick);
                    Flow::Continue
                }
                _ = until(self.clear_at) => {
                    self.clear_at = None;
                    self.transcript.clear();
                    self.publish(SessionUpdate::TranscriptCleared);
                    Flow::Continue
                }
                _ = until(self.finish_at) => {
                    info!("completion grace elapsed, ending session");
                    Flow::Stop
                }
            };
            if let Flow::Stop = flow {
                break;
            }
        }

        self.teardown()
    }

    fn publish(&self, update: SessionUpdate) {
        // Nobody listening is fine; the loop still owns the session.
        let _ = self.updates.send(update);
    }

    fn publish_state(&self) {
        self.publish(SessionUpdate::State(Snapshot {
            state: self.state,
            phase: self.state.phase(self.completed),
            exercises: self.exercises.clone(),
        }));
    }

    fn send(&self, message: ClientMessage) {
        if !self.remote.send(message) {
            debug!("send skipped, remote session closed");
        }
    }

    fn report(&self, error: &SpotterError) {
        warn!("session error: {}", error);
        self.publish(SessionUpdate::Error(error.to_string()));
    }

    fn handle_server_event(&mut self, event: ServerEvent) -> Flow {
        match event {
            ServerEvent::Interrupted => {
                let dropped = self.playback.interrupt();
                debug!("barge-in, {} segments dropped", dropped);
                self.publish(SessionUpdate::AgentSpeaking(false));
            }
            ServerEvent::Audio(data) => self.on_audio(&data),
            ServerEvent::Transcription(text) => {
                self.clear_at = None;
                self.transcript.push_str(&text);
                self.publish(SessionUpdate::Transcript(self.transcript.clone()));
            }
            ServerEvent::TurnComplete => {
                self.clear_at = Some(Instant::now() + self.config.transcript_clear_delay);
            }
            ServerEvent::ToolCall(calls) => {
                for call in calls {
                    self.dispatch_tool_call(&call);
                }
            }
            ServerEvent::GoAway(time_left) => {
                warn!("remote will disconnect soon, time_left={:?}", time_left);
            }
            ServerEvent::Error(message) => {
                self.report(&SpotterError::RemoteSession(message));
            }
            ServerEvent::Closed => {
                info!("remote closed the session");
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    fn on_audio(&mut self, data: &str) {
        let buffer = decode_base64(data).and_then(|bytes| {
            decode_audio_data(&bytes, self.config.playback_sample_rate, 1)
        });
        let buffer = match buffer {
            Ok(buffer) => buffer,
            Err(e) => {
                // Drop this segment only; playback carries on.
                self.report(&e);
                return;
            }
        };
        let was_speaking = self.playback.is_speaking();
        if self.playback.schedule(&buffer).is_some() && !was_speaking {
            self.publish(SessionUpdate::AgentSpeaking(true));
        }
    }

    fn on_segment_played(&mut self, id: SegmentId) {
        if self.playback.on_finished(id) {
            self.publish(SessionUpdate::AgentSpeaking(false));
        }
    }

    fn dispatch_tool_call(&mut self, call: &ToolCall) {
        debug!("tool call id={} name={} args={:?}", call.id, call.name, call.args);
        match parse_tool_call(call) {
            Ok(event) => {
                self.apply(event, Origin::Remote);
                self.send(ClientMessage::tool_ok(call));
            }
            Err(e) => {
                self.report(&e);
                self.send(ClientMessage::tool_error(call, &e.to_string()));
            }
        }
    }

    fn apply(&mut self, event: WorkoutEvent, origin: Origin) {
        let index = self.state.current_exercise_index;
        let transition = workout::next(
            &mut self.state,
            &mut self.exercises,
            event,
            self.catalog.as_ref(),
        );
        if transition != Transition::NoOp && event == WorkoutEvent::FinishSet {
            self.tally.record(index);
        }

        match transition {
            Transition::StartRest(0) => {
                self.state.is_resting = false;
            }
            Transition::StartRest(seconds) => {
                self.timer.start(seconds);
            }
            Transition::Advanced => self.timer.cancel(),
            Transition::Completed => {
                self.timer.cancel();
                self.completed = true;
                self.finish_at = Some(Instant::now() + self.config.completion_grace);
                info!("workout complete, {} sets finished", self.tally.total());
                self.publish(SessionUpdate::WorkoutComplete);
            }
            Transition::DifficultyChanged(_) => {}
            Transition::NoOp => return,
        }

        if origin == Origin::Local || matches!(transition, Transition::DifficultyChanged(_)) {
            self.send(ClientMessage::RealtimeText(status_update(
                &self.state,
                &self.exercises,
            )));
        }
        self.publish_state();
    }

    fn on_tick(&mut self, tick: TimerTick) {
        if !self.timer.is_current(&tick) {
            debug!("stale tick from timer {}", tick.generation);
            return;
        }
        self.timer.finish(&tick);
        if !self.state.active {
            return;
        }
        let rest_over = self.state.tick();
        self.publish(SessionUpdate::RestTick(self.state.timer));
        if rest_over {
            debug!("rest over, set {} up next", self.state.current_set);
        }
        self.publish_state();
    }

    /// Release everything the session owns and build the history record.
    fn teardown(mut self) -> WorkoutSession {
        self.state.active = false;
        self.state.is_resting = false;
        self.timer.cancel();
        self.remote.close();
        self.capture.stop();
        self.playback.stop();

        let record = build_history(&self.exercises, &self.tally, Utc::now());
        info!(
            "session ended id={} completed={} sets={}",
            record.id,
            self.completed,
            record.total_sets()
        );
        self.publish_state();
        self.publish(SessionUpdate::Ended(record.clone()));
        record
    }
}
