use anyhow::{Context, Result};
use crossterm::event::{self, KeyCode, KeyEventKind};
use ratatui::{
    DefaultTerminal, Frame,
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::time::Duration;

use spotter::models::{Difficulty, Exercise, Profile, WorkoutSession};
use spotter::session::{SessionHandle, SessionUpdate, Snapshot};
use spotter::workout::{Phase, WorkoutState};

const KEYS_HELP: &str = "f: finish set | n: next exercise | 1/2/3: easy/medium/hard | q: stop";

/// Everything the dashboard shows, folded from session updates.
pub struct Dashboard {
    title: String,
    snapshot: Snapshot,
    transcript: String,
    speaking: bool,
    status_message: String,
    ended: Option<WorkoutSession>,
}

impl Dashboard {
    pub fn new(profile: &Profile, exercises: &[Exercise]) -> Self {
        Self {
            title: format!(
                "Spotter - {} ({}, {} coach)",
                profile.name, profile.goal, profile.coach_style
            ),
            snapshot: Snapshot {
                state: WorkoutState::started(),
                phase: Phase::Lifting,
                exercises: exercises.to_vec(),
            },
            transcript: String::new(),
            speaking: false,
            status_message: KEYS_HELP.to_string(),
            ended: None,
        }
    }

    pub fn apply(&mut self, update: SessionUpdate) {
        match update {
            SessionUpdate::State(snapshot) => self.snapshot = snapshot,
            SessionUpdate::Transcript(text) => self.transcript = text,
            SessionUpdate::TranscriptCleared => self.transcript.clear(),
            SessionUpdate::AgentSpeaking(speaking) => self.speaking = speaking,
            SessionUpdate::RestTick(_) => {}
            SessionUpdate::WorkoutComplete => {
                self.status_message = "Workout complete! Wrapping up...".to_string();
            }
            SessionUpdate::Error(e) => self.status_message = format!("Error: {}", e),
            SessionUpdate::Ended(record) => self.ended = Some(record),
        }
    }

    pub fn ended(&self) -> bool {
        self.ended.is_some()
    }

    fn status_lines(&self) -> String {
        let state = &self.snapshot.state;
        let Some(ex) = self.snapshot.current_exercise() else {
            return "No exercise".to_string();
        };
        let phase = match self.snapshot.phase {
            Phase::Idle => "Idle".to_string(),
            Phase::Lifting => "Lifting".to_string(),
            Phase::Resting => format!("Resting - {}s", state.timer),
            Phase::Completed => "Completed".to_string(),
        };
        format!(
            "{}\nSet {} of {} - {} reps\n{}\nDifficulty: {}\nCoach: {}",
            ex.name,
            state.current_set.min(ex.target_sets),
            ex.target_sets,
            ex.target_reps,
            phase,
            ex.difficulty.unwrap_or(Difficulty::Medium),
            if self.speaking { "speaking" } else { "listening" }
        )
    }

    fn draw(&self, frame: &mut Frame) {
        let chunks = Layout::vertical([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

        // Header
        let header = Paragraph::new(self.title.as_str())
            .style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(header, chunks[0]);

        let body = Layout::horizontal([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(chunks[1]);

        let current = self.snapshot.state.current_exercise_index;
        let items: Vec<ListItem> = self
            .snapshot
            .exercises
            .iter()
            .enumerate()
            .map(|(idx, ex)| {
                let style = if idx == current && self.snapshot.state.active {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD)
                } else if idx < current || self.snapshot.phase == Phase::Completed {
                    Style::default().fg(Color::DarkGray)
                } else {
                    Style::default()
                };
                ListItem::new(ex.to_string()).style(style)
            })
            .collect();
        let list = List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Workout ({} exercises)", self.snapshot.exercises.len())),
        );
        let mut list_state = ListState::default();
        list_state.select(Some(current));
        frame.render_stateful_widget(list, body[0], &mut list_state);

        let right = Layout::vertical([Constraint::Length(7), Constraint::Min(1)]).split(body[1]);
        let status = Paragraph::new(self.status_lines())
            .block(Block::default().borders(Borders::ALL).title("Now"));
        frame.render_widget(status, right[0]);

        let transcript = Paragraph::new(self.transcript.as_str())
            .style(Style::default().fg(Color::Yellow))
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Coach"));
        frame.render_widget(transcript, right[1]);

        // Footer with status
        let footer = Paragraph::new(self.status_message.as_str())
            .style(Style::default().fg(Color::White))
            .block(Block::default().borders(Borders::ALL).title("Status"));
        frame.render_widget(footer, chunks[2]);
    }
}

pub async fn run_session_dashboard(
    mut terminal: DefaultTerminal,
    profile: &Profile,
    mut handle: SessionHandle,
) -> Result<WorkoutSession> {
    let mut updates = handle
        .take_updates()
        .context("session updates already taken")?;
    let mut dashboard = Dashboard::new(profile, handle.planned_exercises());

    loop {
        while let Ok(update) = updates.try_recv() {
            dashboard.apply(update);
        }
        if dashboard.ended() {
            return Ok(handle.wait().await?);
        }

        terminal.draw(|frame| dashboard.draw(frame))?;

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        let event::Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                dashboard.status_message = "Stopping...".to_string();
                terminal.draw(|frame| dashboard.draw(frame))?;
                return Ok(handle.stop().await?);
            }
            KeyCode::Char('f') | KeyCode::Char('F') => {
                handle.finish_set();
            }
            KeyCode::Char('n') | KeyCode::Char('N') => {
                handle.next_exercise();
            }
            KeyCode::Char('1') => {
                handle.set_difficulty(Difficulty::Easy);
            }
            KeyCode::Char('2') => {
                handle.set_difficulty(Difficulty::Medium);
            }
            KeyCode::Char('3') => {
                handle.set_difficulty(Difficulty::Hard);
            }
            _ => {}
        }
    }
}
