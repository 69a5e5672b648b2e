use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use seekchat_core::config::API_KEY_ENV;
use seekchat_core::{Settings, SettingsStore};

mod app;
mod clipboard;
mod commands;
mod handler;
mod logging;
mod markdown;
mod shortcuts;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "seekchat", version)]
#[command(about = "Terminal chat client for the DeepSeek API")]
struct Cli {
    /// Config file to use instead of the platform default
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log filter such as "debug" or "seekchat_core=trace" (SEEKCHAT_LOG wins)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.log_level.as_deref())?;

    let config_path = match cli.config {
        Some(path) => path,
        None => Settings::default_path()?,
    };
    let settings = Settings::load_from(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    let env_key = std::env::var(API_KEY_ENV).ok();
    tracing::info!(
        config = %config_path.display(),
        env_key = env_key.is_some(),
        "starting seekchat"
    );

    let mut app = App::new(SettingsStore::with_path(settings, config_path, env_key));

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let mut events = EventHandler::new();
    events.watch(app.chat.subscribe());
    events.watch(app.settings.subscribe());
    events.watch(app.balance.subscribe());

    let result = run(&mut terminal, &mut app, &mut events).await;

    app.balance.shutdown();
    tui::restore()?;

    if let Err(e) = &result {
        tracing::error!(error = ?e, "seekchat exited with an error");
    }
    result
}

async fn run(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }
    Ok(())
}
