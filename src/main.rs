use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::Parser;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

mod app;
mod backend;
mod config;
mod handler;
mod state;
mod tui;
mod ui;

#[cfg(test)]
mod testing;

use app::{App, QueryOutcome};
use backend::{HttpBackend, QueryResponse};
use config::Config;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "movie-assistant", version)]
#[command(about = "Ask a movie graph database questions in plain language")]
struct Cli {
    /// Base URL of the query service (requests go to <ENDPOINT>/query)
    #[arg(short, long, env = "MOVIE_ASSISTANT_ENDPOINT")]
    endpoint: Option<String>,

    /// Remember the resolved endpoint in the config file
    #[arg(long)]
    save_endpoint: bool,

    /// Log file path (defaults to the platform data directory)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.log_file.clone());

    let mut config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Could not load config, using defaults");
        Config::default()
    });
    let endpoint = config.resolve_endpoint(cli.endpoint.as_deref());

    if cli.save_endpoint {
        config.endpoint = Some(endpoint.clone());
        config.save()?;
    }

    tracing::info!(endpoint = %endpoint, "Starting movie assistant");

    let backend = Arc::new(HttpBackend::new(&endpoint));
    let mut app = App::new(backend, &endpoint);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    if app.pending {
        tracing::info!("Exiting with a request still in flight");
    }
    result
}

async fn run(terminal: &mut Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new(tui::TICK_RATE);

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        tokio::select! {
            event = events.next() => match event {
                Some(event) => handler::handle_event(app, event),
                None => break,
            },
            outcome = settled(&mut app.query_task) => app.finish_query(outcome),
        }
    }

    Ok(())
}

/// Resolves when the in-flight request settles; never resolves when idle
async fn settled(task: &mut Option<JoinHandle<Result<QueryResponse>>>) -> QueryOutcome {
    match task.as_mut() {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

/// Log to a file; the terminal is owned by the TUI. Failure here is not fatal.
fn init_logging(path: Option<PathBuf>) {
    let Some(path) = path.or_else(default_log_path) else {
        return;
    };
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "movie_assistant=info".into()),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
}

fn default_log_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("movie-assistant").join("movie-assistant.log"))
}
