use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `streamchat_core=debug`.
pub const LOG_ENV: &str = "STREAMCHAT_LOG";

/// Keeps the background log writer alive; logs are flushed when dropped.
pub struct LogGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

fn log_dir() -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine cache directory"))?;
    Ok(cache_dir.join("streamchat"))
}

/// Send all tracing output to a file. The terminal belongs to the UI,
/// so nothing is written to stdout or stderr.
pub fn init_logging() -> Result<LogGuard> {
    let dir = log_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| {
        anyhow::anyhow!("Failed to create log directory {}: {}", dir.display(), e)
    })?;

    let file_appender = tracing_appender::rolling::never(&dir, "streamchat.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))?;

    Ok(LogGuard { _guard: guard })
}
