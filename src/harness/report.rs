//! Run reports
//!
//! A [`Report`] is an immutable snapshot. The aggregator produces the
//! observation part; the orchestrator adds how the run ended.

use serde::Serialize;

use super::events::{ConnectionAttempt, Device};

/// RTSP request outcome counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RequestCounts {
    pub success: u64,
    pub forbidden_403: u64,
    pub internal_error_500: u64,
    pub connection_failed: u64,
    pub other_failure: u64,
}

impl RequestCounts {
    /// Failed requests across all reasons
    pub fn failed(&self) -> u64 {
        self.forbidden_403 + self.internal_error_500 + self.connection_failed + self.other_failure
    }

    pub fn total(&self) -> u64 {
        self.success + self.failed()
    }
}

/// Authentication artifact counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuthCounts {
    pub apple_response: u64,
    pub rsa_aes_key: u64,
    pub aes_iv: u64,
}

/// Everything aggregated from the log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Observations {
    /// Discovered devices in order of first discovery
    pub devices: Vec<Device>,
    pub requests: RequestCounts,
    pub auth: AuthCounts,
    /// Most recent connection attempts, oldest first
    pub recent_attempts: Vec<ConnectionAttempt>,
    pub total_attempts: u64,
    /// Non-empty lines no rule recognised
    pub unmatched_lines: u64,
    /// Non-empty lines seen
    pub lines_seen: u64,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Monitoring ran for the configured duration
    Completed,
    /// Monitoring was interrupted; observations are best effort
    Cancelled,
    /// The target never started
    LaunchFailed,
    /// An existing log was analyzed without launching anything
    Analyzed,
}

/// How the target process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessExit {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl std::fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "signal {}", signal),
            (None, None) => write!(f, "unknown status"),
        }
    }
}

/// Overall judgement of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
    Inconclusive,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
            Self::Inconclusive => write!(f, "INCONCLUSIVE"),
        }
    }
}

/// Final report of a harness run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub status: RunStatus,
    /// Why the target could not be launched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// False when the run could not observe anything at all
    pub complete: bool,
    pub observations: Observations,
    /// Exit observed while the harness was running, if any
    pub process_exit: Option<ProcessExit>,
    /// Monitoring ticks executed
    pub ticks: u64,
    pub elapsed_ms: u64,
}

impl Report {
    /// Report for a target that never started: flagged incomplete, no counters
    pub fn launch_failed(error: impl std::fmt::Display) -> Self {
        Self {
            status: RunStatus::LaunchFailed,
            error: Some(error.to_string()),
            complete: false,
            observations: Observations::default(),
            process_exit: None,
            ticks: 0,
            elapsed_ms: 0,
        }
    }

    pub fn verdict(&self) -> Verdict {
        if !self.complete {
            return Verdict::Fail;
        }
        let requests = &self.observations.requests;
        if requests.failed() > 0 {
            Verdict::Fail
        } else if requests.success > 0 {
            Verdict::Pass
        } else {
            Verdict::Inconclusive
        }
    }
}
