use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Directory for the rotating JSON log, default `logs`.
pub const LOG_DIR_ENV: &str = "DWH_LOG_DIR";
const LOG_FILE_PREFIX: &str = "warehouse.log";
const DEFAULT_FILTER: &str = "songplay_warehouse=info,warn";

/// Console output on stderr plus a daily-rotated JSON file.
///
/// Keep the returned guard alive until exit; dropping it flushes the file
/// writer. If the log directory cannot be created only the console layer
/// is installed.
pub fn init_logging() -> Option<WorkerGuard> {
    let log_dir = std::env::var_os(LOG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("logs"));

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // stdout carries the per-stage status lines
    let console_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    let (file_layer, guard) = match std::fs::create_dir_all(&log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().json().with_writer(writer)), Some(guard))
        }
        Err(e) => {
            eprintln!("Log directory {} unavailable ({e}); logging to console only", log_dir.display());
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    guard
}
