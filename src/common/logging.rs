//! Logging and tracing configuration
//!
//! Diagnostics go to stderr so stdout stays reserved for the report and
//! echoed log lines. A run can additionally keep a diagnostics file.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::paths;

/// Name of the diagnostics file inside the log directory
const LOG_FILE_NAME: &str = "castprobe.log";

/// Default filter for a verbosity level (`-v` count)
fn default_filter(verbosity: u8) -> EnvFilter {
    let directive = match verbosity {
        0 => "castprobe=info,warn",
        1 => "castprobe=debug,info",
        _ => "castprobe=trace,debug",
    };
    EnvFilter::new(directive)
}

/// Initialize tracing for the CLI
///
/// Logs are controlled by the `RUST_LOG` environment variable, falling back
/// to a level derived from `verbosity`. When `to_file` is set, a second layer
/// writes to `<data_dir>/logs/castprobe.log`; keep the returned guard alive
/// until exit so buffered lines are flushed.
pub fn init_cli(verbosity: u8, to_file: bool) -> Option<(PathBuf, WorkerGuard)> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbosity));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact();

    let file = if to_file { open_log_file() } else { None };

    match file {
        Some((path, file)) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(file_layer)
                .init();

            Some((path, guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            None
        }
    }
}

/// Open the diagnostics file for appending
fn open_log_file() -> Option<(PathBuf, std::fs::File)> {
    let dir = match paths::ensure_log_dir() {
        Ok(Some(dir)) => dir,
        Ok(None) => return None,
        Err(e) => {
            eprintln!("Warning: Could not create log directory: {}", e);
            return None;
        }
    };

    let path = dir.join(LOG_FILE_NAME);
    match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => Some((path, file)),
        Err(e) => {
            eprintln!("Warning: Could not open log file: {}", e);
            None
        }
    }
}
