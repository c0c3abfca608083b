use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use interview_core::{Config, HttpBackend, OverlayMode};
use tracing_subscriber::EnvFilter;

mod app;
mod handler;
mod markdown;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

#[derive(Parser, Debug)]
#[command(name = "interview")]
#[command(version, about = "Rehearse job interviews with an AI assistant that has read your resume")]
struct Cli {
    /// Backend base URL, e.g. http://127.0.0.1:8000
    #[arg(long)]
    base_url: Option<String>,

    /// Seconds to wait for a backend reply
    #[arg(long)]
    timeout: Option<u64>,

    /// Floating chat: separate, shared or off
    #[arg(long, value_parser = parse_overlay)]
    overlay: Option<OverlayMode>,

    /// Your name, used in the greeting
    #[arg(long)]
    name: Option<String>,

    /// Read settings from this file instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write logs
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Write the effective settings to the config file and exit
    #[arg(long)]
    save_config: bool,
}

fn parse_overlay(s: &str) -> Result<OverlayMode, String> {
    OverlayMode::parse(s).map_err(|e| e.to_string())
}

/// Defaults, then the config file, then environment, then flags.
fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => Config::load()?,
    };
    let mut config = config
        .apply_env()?
        .apply_overrides(cli.base_url.clone(), cli.timeout.map(|t| t.to_string()))?;

    if let Some(mode) = cli.overlay {
        config.overlay_mode = mode;
    }
    if let Some(name) = &cli.name {
        config.candidate_name = Some(name.clone());
    }
    Ok(config)
}

fn default_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("interview-assistant")
        .join("client.log")
}

/// Logs go to a file; the terminal belongs to the UI.
fn init_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    if cli.save_config {
        match &cli.config {
            Some(path) => config.save_to(path)?,
            None => config.save()?,
        }
        println!("Settings saved.");
        return Ok(());
    }

    let log_path = cli.log_file.clone().unwrap_or_else(default_log_path);
    init_logging(&log_path)?;
    tracing::info!(base_url = %config.base_url, overlay = config.overlay_mode.as_str(), "starting");

    // Restore the terminal even if the UI panics
    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = run(&mut terminal, &config).await;

    tui::restore()?;
    if let Err(err) = &result {
        tracing::error!(error = %err, "exiting with error");
    }
    result
}

async fn run(terminal: &mut Tui, config: &Config) -> Result<()> {
    let mut events = EventHandler::new();
    let backend = Arc::new(HttpBackend::from_config(config)?);
    let mut app = App::new(config, backend, events.sender());
    app.session.check_backend();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(&mut app, event)?,
            None => break,
        }
    }

    app.session.shutdown();
    tracing::info!("shutting down");
    Ok(())
}
