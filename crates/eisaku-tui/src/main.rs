use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use eisaku_core::{Config, Controller, ControllerOptions, ExamClient};

mod app;
mod handler;
mod render;
mod tui;
mod ui;
#[cfg(test)]
mod test_helpers;

use app::App;
use render::MessageRenderer;
use tui::{EventHandler, Tui, TICK_INTERVAL};

#[derive(Parser)]
#[command(name = "eisaku", version)]
#[command(about = "Practice English-composition exam questions and get them graded in a chat")]
struct Cli {
    /// Exam service URL (overrides EISAKU_BASE_URL and the config file)
    #[arg(long)]
    base_url: Option<String>,
    /// Institution to request questions for
    #[arg(short, long)]
    institution: Option<String>,
    /// Interface language: ja or en
    #[arg(long)]
    locale: Option<String>,
    /// Log level written to the log file (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging is not up yet; report a bad config file once it is
    let (mut config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::new(), Some(e)),
    };
    if let Some(institution) = cli.institution {
        config.institution = Some(institution);
    }
    if let Some(locale) = cli.locale {
        config.locale = Some(locale);
    }
    let base_url = cli.base_url.unwrap_or_else(|| config.base_url());
    let log_level = cli.log_level.unwrap_or_else(|| config.log_level());

    init_logging(&log_level)?;
    if let Some(e) = &config_error {
        tracing::warn!(error = %e, "could not read config file, using defaults");
    }
    tracing::info!(%base_url, institution = %config.institution(), "starting session");

    let client = ExamClient::new(&base_url);
    let controller = Controller::new(Arc::new(client), ControllerOptions::from_config(&config));
    let renderer = MessageRenderer::new(Duration::from_millis(config.reveal_delay_ms()));
    let mut app = App::new(controller, renderer, config.institutions(), base_url);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = run(&mut terminal, &mut app).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new(TICK_INTERVAL);

    // First question arrives without any user action
    app.controller.start();

    while !app.should_quit {
        app.sync(Instant::now());
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
    }

    Ok(())
}

/// Log to a file under the config directory; the terminal belongs to the UI.
fn init_logging(level: &str) -> Result<()> {
    let level: tracing::Level = level
        .parse()
        .with_context(|| format!("invalid log level: {}", level))?;

    let dir = Config::config_dir()?;
    std::fs::create_dir_all(&dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("eisaku.log"))?;

    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_max_level(level)
        .init();

    Ok(())
}
