//! Tracing setup.
//!
//! Console output is always on. When `[logging].file` is set, the same
//! events are also appended (never rotated, never truncated) to that file
//! without ANSI colors.
//!
//! `RUST_LOG` overrides the default filter
//! (`outfit_finder=info,outfit=info,tower_http=info`).

use anyhow::Result;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

const DEFAULT_FILTER: &str = "outfit_finder=info,outfit=info,tower_http=info";

/// Installs the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held
/// until the process exits.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    let log_file = config
        .file
        .as_deref()
        .filter(|p| !p.as_os_str().is_empty());

    let Some(path) = log_file else {
        registry.try_init()?;
        return Ok(None);
    };

    let dir = path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("logging.file has no file name: {}", path.display()))?;

    std::fs::create_dir_all(dir)?;
    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    registry
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .try_init()?;

    Ok(Some(guard))
}
