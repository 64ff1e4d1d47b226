mod dashboard;
mod store;

use anyhow::{Context, Result, bail};
use chrono::DateTime;
use clap::{Parser, Subcommand, ValueEnum};
use dotenvy::dotenv;
use log::{debug, info};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

use spotter::config::{LiveConfig, SessionConfig};
use spotter::live::{LiveClient, MockRemote};
use spotter::logging::{LogTarget, set_log_level};
use spotter::models::{CoachStyle, Experience, Goal, Profile};
use spotter::recommendation::{ExerciseCatalog, RecommendationEngine};
use spotter::session::SessionHandle;

use crate::dashboard::run_session_dashboard;
use crate::store::Store;

const DEFAULT_DATA_DIR: &str = ".spotter";

#[derive(Parser, Debug)]
#[command(version, about = "Spotter - voice coached workouts", long_about = None)]
struct Args {
    /// Where the profile, history and log live (defaults to $SPOTTER_DATA_DIR or ./.spotter)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendType {
    Gemini,
    Mock,
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendType::Gemini => write!(f, "gemini"),
            BackendType::Mock => write!(f, "mock"),
        }
    }
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    /// Show the stored profile
    Show,
    /// Create or replace the stored profile
    Set {
        #[arg(short, long)]
        name: String,
        #[arg(long)]
        age: u32,
        #[arg(long)]
        weight: f32,
        #[arg(long)]
        height: f32,
        #[arg(short, long)]
        goal: Goal,
        #[arg(short, long)]
        experience: Experience,
        #[arg(short, long, default_value_t = CoachStyle::Supportive)]
        coach: CoachStyle,
    },
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage the user profile
    Profile {
        #[command(subcommand)]
        action: ProfileCommand,
    },
    /// Print the workout that would be recommended
    Plan {
        #[arg(short, long)]
        goal: Option<Goal>,
        #[arg(short, long)]
        experience: Option<Experience>,
    },
    /// Start a live coached session
    Start {
        #[arg(short, long, default_value_t = BackendType::Gemini)]
        backend: BackendType,
        /// Run without microphone and speaker
        #[arg(long)]
        headless: bool,
    },
    /// List past sessions
    History {
        #[arg(short, long)]
        verbose: bool,
    },
}

fn data_dir(args: &Args) -> PathBuf {
    args.data_dir
        .clone()
        .or_else(|| env::var("SPOTTER_DATA_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

fn require_profile(store: &Store) -> Result<Profile> {
    store
        .load_profile()?
        .context("no profile yet, create one with `spotter profile set`")
}

fn profile_command(store: &Store, action: ProfileCommand) -> Result<()> {
    match action {
        ProfileCommand::Show => {
            let p = require_profile(store)?;
            println!("{}, {} years, {}kg, {}cm", p.name, p.age, p.weight_kg, p.height_cm);
            println!(
                "goal: {}, experience: {}, coach: {}",
                p.goal, p.experience, p.coach_style
            );
        }
        ProfileCommand::Set {
            name,
            age,
            weight,
            height,
            goal,
            experience,
            coach,
        } => {
            if name.trim().is_empty() {
                bail!("name must not be empty");
            }
            let profile = Profile {
                name,
                age,
                weight_kg: weight,
                height_cm: height,
                goal,
                experience,
                coach_style: coach,
            };
            store.save_profile(&profile)?;
            println!("Saved profile for {}", profile.name);
        }
    }
    Ok(())
}

/// Keep a mock line open for the whole session and throw away what the
/// session sends, so captured audio does not pile up. Resolves to the number
/// of discarded messages once the session closes the line.
fn discard_outbound(mut remote: MockRemote) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut discarded = 0;
        while remote.next_sent().await.is_some() {
            discarded += 1;
        }
        debug!("mock line closed after {} outbound messages", discarded);
        discarded
    })
}

async fn start_session(
    store: &Store,
    backend: BackendType,
    headless: bool,
) -> Result<()> {
    let profile = require_profile(store)?;
    let config = if headless {
        SessionConfig::headless()
    } else {
        SessionConfig::default()
    };
    let catalog: Arc<dyn ExerciseCatalog> = Arc::new(RecommendationEngine::new());

    let client = match backend {
        BackendType::Gemini => LiveClient::new_gemini(LiveConfig::from_env()?),
        BackendType::Mock => {
            let (client, remote) = LiveClient::new_mock();
            discard_outbound(remote);
            client
        }
    };

    println!("Connecting to {} coach...", client.backend_name());
    let handle = SessionHandle::start(config, &profile, catalog, &client).await?;

    let terminal = ratatui::init();
    let result = run_session_dashboard(terminal, &profile, handle).await;
    ratatui::restore();

    let record = result?;
    let total = store.append_history(&record)?;
    info!("saved session id={} history={}", record.id, total);
    println!(
        "Session saved: {} sets across {} exercises.",
        record.total_sets(),
        record.exercises.len()
    );
    Ok(())
}

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();
    let store = Store::open(data_dir(&args))?;

    if !set_log_level(&args.log_level, LogTarget::File(store.log_path())) {
        bail!("unknown log level: {}", args.log_level);
    }

    match args.command {
        Commands::Profile { action } => profile_command(&store, action),
        Commands::Plan { goal, experience } => {
            let (goal, experience) = match (goal, experience) {
                (Some(g), Some(e)) => (g, e),
                (g, e) => {
                    let p = require_profile(&store)?;
                    (g.unwrap_or(p.goal), e.unwrap_or(p.experience))
                }
            };
            let exercises = RecommendationEngine::new().recommend_workout(goal, experience);
            println!("{} workout for a {} lifter:", goal, experience);
            for (i, ex) in exercises.iter().enumerate() {
                println!("{}. {}", i + 1, ex);
                println!("\t{} - {}", ex.muscle_group, ex.description);
            }
            Ok(())
        }
        Commands::Start { backend, headless } => start_session(&store, backend, headless).await,
        Commands::History { verbose } => {
            let history = store.load_history()?;
            if history.is_empty() {
                println!("No sessions yet");
            }
            for session in history {
                let date = DateTime::parse_from_rfc3339(&session.date)
                    .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or(session.date.clone());
                println!(
                    "{}, {}, {} sets",
                    date,
                    session.id,
                    session.total_sets()
                );
                if verbose {
                    for log in &session.exercises {
                        let reps: Vec<String> =
                            log.sets.iter().map(|s| s.reps.to_string()).collect();
                        println!("\t{}: {}", log.exercise_id, reps.join(", "));
                    }
                }
            }
            Ok(())
        }
    }
}
