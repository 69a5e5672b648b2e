use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_ENV: &str = "SEEKCHAT_LOG";
const LOG_FILE: &str = "seekchat.log";

/// Where log files go. The terminal belongs to the UI, so nothing is written
/// to stdout or stderr.
pub fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::data_dir)
        .map(|dir| dir.join("seekchat"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// `SEEKCHAT_LOG` wins over `--log-level`, which wins over the default.
fn filter(level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .ok()
        .or_else(|| level.and_then(|l| EnvFilter::try_new(l).ok()))
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Install the global subscriber. Keep the guard alive until exit so
/// buffered lines are flushed.
pub fn init(level: Option<&str>) -> Result<WorkerGuard> {
    let dir = log_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::daily(&dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter(level))
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(guard)
}
