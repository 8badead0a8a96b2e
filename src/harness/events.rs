//! Domain events extracted from log lines

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A casting receiver announced by the application under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl Device {
    /// Identity of a device; two announcements with the same key are the
    /// same receiver even if the name changed
    pub fn key(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }
}

/// Why an RTSP request failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Forbidden403,
    InternalError500,
    ConnectionFailed,
    Other,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forbidden403 => write!(f, "403 Forbidden"),
            Self::InternalError500 => write!(f, "500 Internal Error"),
            Self::ConnectionFailed => write!(f, "Connection failed"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Outcome of a single RTSP request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum RequestOutcome {
    Success,
    Failed(FailureReason),
}

/// Presence of an authentication artifact in the RTSP exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthSignal {
    /// `Apple-Response:` header
    AppleResponsePresent,
    /// `rsaaeskey:` SDP field
    RsaAesKeyPresent,
    /// `aesiv:` SDP field
    AesIvPresent,
}

/// A connection attempt announced by the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionAttempt {
    pub target: String,
    pub observed_at: DateTime<Utc>,
}

/// A typed record extracted from one log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    DeviceDiscovered(Device),
    Request(RequestOutcome),
    Auth(AuthSignal),
    ConnectionAttempt(ConnectionAttempt),
}
