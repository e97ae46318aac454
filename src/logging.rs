//! Logging setup for chatrelay using tracing.

use anyhow::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Logging;

/// Initialize logging: a daily rolling file (text or JSON lines) plus
/// console output on stderr.
///
/// The returned guard flushes the file writer when dropped, so the caller
/// keeps it alive for as long as the process runs.
pub fn init(config: &Logging) -> Result<(WorkerGuard, PathBuf)> {
    let log_dir = resolve_log_dir(config)?;
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, &config.file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter)?,
    };

    let json_file_layer = config.json.then(|| {
        fmt::layer()
            .json()
            .with_writer(non_blocking.clone())
            .with_current_span(true)
            .with_target(true)
    });

    let text_file_layer = (!config.json).then(|| {
        fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
    });

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(json_file_layer)
        .with(text_file_layer)
        .with(console_layer)
        .try_init()?;

    tracing::info!(
        log_dir = %log_dir.display(),
        file = %config.file_name,
        json = config.json,
        "chatrelay logging initialized"
    );

    Ok((guard, log_dir))
}

/// The configured log directory, or `<data dir>/logs`.
pub fn resolve_log_dir(config: &Logging) -> Result<PathBuf> {
    match &config.dir {
        Some(dir) => Ok(dir.clone()),
        None => default_log_dir(),
    }
}

fn default_log_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("com", "chatrelay", "chatrelay")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;

    Ok(dirs.data_dir().join("logs"))
}

/// Initialize logging for tests (console only, no file). Safe to call from
/// many tests; only the first call installs the subscriber.
#[cfg(test)]
pub fn init_test() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_test_writer())
        .try_init();
}
