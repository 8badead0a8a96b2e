//! Error types for castprobe
//!
//! Only launch failures abort a run. Everything the harness observes after
//! the target is up degrades into counters or warnings instead of errors,
//! so most of these variants surface from configuration and CLI plumbing.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for castprobe
#[derive(Error, Debug)]
pub enum Error {
    // === Launch Errors ===
    #[error("Target program '{0}' not found. Set `target.program` in config.toml or pass --program")]
    ProgramNotFound(String),

    #[error("Permission denied launching '{0}'. Check that the file is executable")]
    LaunchPermissionDenied(String),

    #[error("Failed to launch '{program}': {source}")]
    LaunchFailed {
        program: String,
        #[source]
        source: io::Error,
    },

    // === Log Errors ===
    #[error("Cannot read log file '{}': {source}", path.display())]
    LogAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Classify an io error from spawning `program` into a launch error
    pub fn launch(program: &str, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::ProgramNotFound(program.to_string()),
            io::ErrorKind::PermissionDenied => Self::LaunchPermissionDenied(program.to_string()),
            _ => Self::LaunchFailed {
                program: program.to_string(),
                source,
            },
        }
    }

    /// Create a log access error for `path`
    pub fn log_access(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::LogAccess {
            path: path.into(),
            source,
        }
    }

    /// Whether this error prevented the target from starting
    pub fn is_launch_error(&self) -> bool {
        matches!(
            self,
            Self::ProgramNotFound(_) | Self::LaunchPermissionDenied(_) | Self::LaunchFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_classifies_io_kinds() {
        let err = Error::launch("caster", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, Error::ProgramNotFound(ref p) if p == "caster"));
        assert!(err.is_launch_error());

        let err = Error::launch("caster", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, Error::LaunchPermissionDenied(_)));

        let err = Error::launch("caster", io::Error::other("boom"));
        assert!(matches!(err, Error::LaunchFailed { .. }));
        assert!(err.is_launch_error());
    }

    #[test]
    fn test_log_access_is_not_launch_error() {
        let err = Error::log_access("test_log.txt", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(!err.is_launch_error());
        assert!(err.to_string().contains("test_log.txt"));
    }
}
