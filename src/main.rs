use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use remote_viewer::api::{self, AppState};
use remote_viewer::client::ApiClient;
use remote_viewer::config::Config;
use remote_viewer::console::{self, ConsolePresenter};
use remote_viewer::db::Database;
use remote_viewer::orchestrator::{
    LocalStore, Orchestrator, OrchestratorConfig, Outcome, Presenter, SessionStore,
};
use remote_viewer::providers::{OpenAiClient, PicsumTargetSource, TargetSource};
use remote_viewer::scoring::{Scorer, ScoringPipeline};

#[derive(Parser)]
#[command(name = "rv")]
#[command(about = "Guided perception sessions with automatic scoring")]
struct Cli {
    /// Use the local database directly instead of the HTTP API
    #[arg(long, global = true)]
    local: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a guided session (resumes an unfinished one if present)
    Run,
    /// Start the HTTP API
    Serve {
        #[arg(short, long, default_value = "8000")]
        port: u16,
    },
    /// Show one session with its notes and score
    Show { id: i64 },
    /// List sessions, newest first
    Sessions {
        #[arg(long)]
        unfinished: bool,
    },
    /// Print the stage reference card
    Cheatsheet,
}

/// Initialize tracing with output to stderr (interactive modes) or stdout
fn init_tracing(use_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "remote_viewer=info,tower_http=info".into()),
    );

    if use_stderr {
        // Console modes: keep stdout for the subject
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn open_database(config: &Config) -> anyhow::Result<Database> {
    let db = Database::open(config.database_path.clone())?;
    db.migrate()?;
    Ok(db)
}

fn build_pipeline(config: &Config, db: &Database) -> ScoringPipeline {
    if config.openai_api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; scoring passes will fail until it is");
    }
    let openai = Arc::new(OpenAiClient::from_config(config));
    ScoringPipeline::new(db.clone(), openai.clone(), Scorer::new(openai))
}

fn target_source(config: &Config) -> Arc<dyn TargetSource> {
    Arc::new(PicsumTargetSource::from_config(config))
}

async fn run_session<S, P>(store: S, presenter: P, config: &Config) -> anyhow::Result<()>
where
    S: SessionStore,
    P: Presenter,
{
    let mut orchestrator = Orchestrator::new(store, presenter, OrchestratorConfig::from_config(config));
    match orchestrator.run().await? {
        Outcome::Scored(session) => {
            tracing::info!("Session {} finished with {:.3}", session.id, session.total_score)
        }
        Outcome::Cancelled(session) => {
            tracing::info!("Session {} left unfinished", session.id)
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let use_stderr = !matches!(cli.command, Some(Commands::Serve { .. }));
    init_tracing(use_stderr);

    let config = Config::from_env()?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let presenter = ConsolePresenter::stdio(config.countdown);
            if cli.local {
                let db = open_database(&config)?;
                let pipeline = build_pipeline(&config, &db);
                let store = LocalStore::new(db, target_source(&config), pipeline);
                run_session(store, presenter, &config).await?;
            } else {
                let store = ApiClient::new(&config.api_url);
                run_session(store, presenter, &config).await?;
            }
        }
        Commands::Serve { port } => {
            tracing::info!("Starting session API on port {}", port);

            let db = open_database(&config)?;
            let pipeline = build_pipeline(&config, &db);
            let app = api::create_router(AppState {
                db,
                targets: target_source(&config),
                pipeline,
            });

            let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
            tracing::info!("Session API listening on http://127.0.0.1:{}/api/v1", port);

            axum::serve(listener, app).await?;
        }
        Commands::Show { id } => {
            let session = if cli.local {
                open_database(&config)?
                    .get_session(id)?
                    .ok_or_else(|| anyhow::anyhow!("Session {} not found", id))?
            } else {
                ApiClient::new(&config.api_url).get_session(id).await?
            };
            print!("{}", console::render_session(&session));
        }
        Commands::Sessions { unfinished } => {
            let sessions = if cli.local {
                open_database(&config)?.list_sessions(unfinished)?
            } else {
                ApiClient::new(&config.api_url)
                    .list_sessions(unfinished)
                    .await?
            };
            if sessions.is_empty() {
                println!("No sessions.");
            }
            for session in &sessions {
                println!("{}", console::render_session_row(session));
            }
        }
        Commands::Cheatsheet => {
            print!("{}", console::render_cheatsheet());
        }
    }

    Ok(())
}
