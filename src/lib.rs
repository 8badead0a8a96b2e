//! castprobe - log-driven conformance harness for casting applications
//!
//! This library launches an application under test, observes it only
//! through the log file it writes, and aggregates recognised protocol
//! events (device discovery, RTSP outcomes, authentication fields,
//! connection attempts) into a report.

pub mod cli;
pub mod commands;
pub mod common;
pub mod harness;
pub mod setup;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use harness::{Report, RunStatus, TestOrchestrator, Verdict};
