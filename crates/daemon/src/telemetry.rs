//! Logging setup for the daemon
//!
//! Console output is pretty or JSON (`log_format`); `RUST_LOG` overrides
//! the default filter. With `log_dir` set, a daily rolling file is added.

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{DaemonConfig, LogFormat};

const DEFAULT_LOG_FILTER: &str = "admit=info";
const LOG_FILE_PREFIX: &str = "admission.log";

/// Console logging plus an optional daily rolling file.
/// The returned guard flushes the file writer on drop.
pub fn init_logging(cfg: &DaemonConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))
        .context("Failed to create env filter")?;

    let (file_writer, guard) = match cfg.log_dir() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    match cfg.log_format {
        LogFormat::Json => {
            let file_layer = file_writer.map(|w| fmt::layer().json().with_writer(w));
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .with(file_layer)
                .init();
        }
        LogFormat::Pretty => {
            let file_layer = file_writer.map(|w| fmt::layer().with_ansi(false).with_writer(w));
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .with(file_layer)
                .init();
        }
    }

    Ok(guard)
}
