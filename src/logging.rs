//! Tracing subscriber setup.
//!
//! Events always go to stderr. When file logging is enabled they are also
//! written, without ANSI colors, to `<workdir>/gitbored-daemon.log` through a
//! non-blocking writer. `RUST_LOG` overrides the configured level.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

pub const LOG_FILE_NAME: &str = "gitbored-daemon.log";

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the process.
pub fn init_logging(config: &LoggingConfig, workdir: &Path, to_file: bool) -> Result<Option<WorkerGuard>> {
    let filter = build_filter(&config.level, std::env::var(EnvFilter::DEFAULT_ENV).ok())?;

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);

    let (file_layer, guard) = if to_file && config.file {
        std::fs::create_dir_all(workdir)
            .with_context(|| format!("Failed to create log directory: {}", workdir.display()))?;
        let appender = tracing_appender::rolling::never(workdir, LOG_FILE_NAME);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer().with_writer(writer).with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

fn build_filter(level: &str, env: Option<String>) -> Result<EnvFilter> {
    let directives = env.filter(|s| !s.trim().is_empty());
    let source = directives.as_deref().unwrap_or(level);
    EnvFilter::try_new(source).with_context(|| format!("Invalid log filter: {source}"))
}
