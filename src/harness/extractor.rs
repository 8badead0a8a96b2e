//! Log line classification
//!
//! Lines are matched against a fixed, ordered rule table. The first rule
//! that matches decides the event; a line that matches nothing yields no
//! event and is only counted. Extraction looks at one line at a time and
//! keeps no state between lines.

use chrono::{DateTime, Utc};
use regex::Regex;

use super::events::{AuthSignal, ConnectionAttempt, Device, DomainEvent, FailureReason, RequestOutcome};
use crate::common::{Error, Result};

const DEVICE_FOUND: &str = r"Device found - (?P<name>.+?) at (?P<host>\S+):(?P<port>\d+)\b";
const CONNECT_ATTEMPT: &str = r"Attempting to connect to device: (?P<target>.+)";

const REQUEST_SUCCESS: &str = "RTSP request successful with status 200";
const REQUEST_FAILED: &str = "RTSP request failed";

/// Failure sub-reasons, highest precedence first
const FAILURE_REASONS: [(&str, FailureReason); 3] = [
    ("403 Forbidden", FailureReason::Forbidden403),
    ("500 Internal Error", FailureReason::InternalError500),
    ("Connection failed", FailureReason::ConnectionFailed),
];

/// Authentication field names, case-sensitive, in match order
const AUTH_FIELDS: [(&str, AuthSignal); 3] = [
    ("Apple-Response:", AuthSignal::AppleResponsePresent),
    ("rsaaeskey:", AuthSignal::RsaAesKeyPresent),
    ("aesiv:", AuthSignal::AesIvPresent),
];

/// Converts raw log lines into domain events
#[derive(Debug, Clone)]
pub struct EventExtractor {
    device_found: Regex,
    connect_attempt: Regex,
}

impl EventExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            device_found: compile(DEVICE_FOUND)?,
            connect_attempt: compile(CONNECT_ATTEMPT)?,
        })
    }

    /// Classify a line, stamping connection attempts with the current time
    pub fn extract(&self, line: &str) -> Option<DomainEvent> {
        self.extract_at(line, Utc::now())
    }

    /// Classify a line observed at `now`
    pub fn extract_at(&self, line: &str, now: DateTime<Utc>) -> Option<DomainEvent> {
        if let Some(device) = self.device(line) {
            return Some(DomainEvent::DeviceDiscovered(device));
        }

        if line.contains(REQUEST_SUCCESS) {
            return Some(DomainEvent::Request(RequestOutcome::Success));
        }

        if line.contains(REQUEST_FAILED) {
            let reason = FAILURE_REASONS
                .iter()
                .find(|(needle, _)| line.contains(needle))
                .map(|(_, reason)| *reason)
                .unwrap_or(FailureReason::Other);
            return Some(DomainEvent::Request(RequestOutcome::Failed(reason)));
        }

        if let Some((_, signal)) = AUTH_FIELDS.iter().find(|(field, _)| line.contains(field)) {
            return Some(DomainEvent::Auth(*signal));
        }

        self.connection_attempt(line, now)
            .map(DomainEvent::ConnectionAttempt)
    }

    /// `Device found - <name> at <host>:<port>`; a port that is not a valid
    /// u16 makes the whole rule miss
    fn device(&self, line: &str) -> Option<Device> {
        let caps = self.device_found.captures(line)?;
        let port = caps["port"].parse::<u16>().ok()?;
        Some(Device {
            name: caps["name"].trim().to_string(),
            host: caps["host"].to_string(),
            port,
        })
    }

    fn connection_attempt(&self, line: &str, now: DateTime<Utc>) -> Option<ConnectionAttempt> {
        let caps = self.connect_attempt.captures(line)?;
        let target = caps["target"].trim();
        if target.is_empty() {
            return None;
        }
        Some(ConnectionAttempt {
            target: target.to_string(),
            observed_at: now,
        })
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::Internal(format!("Invalid pattern '{}': {}", pattern, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(line: &str) -> Option<DomainEvent> {
        EventExtractor::new().unwrap().extract(line)
    }

    #[test]
    fn test_device_found() {
        let event = extract("Device found - Living Room TV at 192.168.1.5:7000");
        assert_eq!(
            event,
            Some(DomainEvent::DeviceDiscovered(Device {
                name: "Living Room TV".to_string(),
                host: "192.168.1.5".to_string(),
                port: 7000,
            }))
        );
    }

    #[test]
    fn test_device_name_containing_at() {
        let event = extract("[discovery] Device found - Cat at Home at speaker.local:7000 (AirPlay)");
        match event {
            Some(DomainEvent::DeviceDiscovered(device)) => {
                assert_eq!(device.name, "Cat at Home");
                assert_eq!(device.host, "speaker.local");
                assert_eq!(device.port, 7000);
            }
            other => panic!("Expected device, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_port_is_not_a_device() {
        assert_eq!(extract("Device found - TV at 10.0.0.2:70a0"), None);
        assert_eq!(extract("Device found - TV at 10.0.0.2:99999"), None);
        assert_eq!(extract("Device found - TV at 10.0.0.2:-1"), None);
    }

    #[test]
    fn test_port_followed_by_punctuation() {
        for line in [
            "Device found - TV at 10.0.0.2:7000.",
            "Device found - TV at 10.0.0.2:7000, retrying",
            "Device found - TV at 10.0.0.2:7000;",
        ] {
            match extract(line) {
                Some(DomainEvent::DeviceDiscovered(device)) => {
                    assert_eq!(device.host, "10.0.0.2");
                    assert_eq!(device.port, 7000);
                }
                other => panic!("Expected device for {:?}, got {:?}", line, other),
            }
        }
    }

    #[test]
    fn test_request_success() {
        assert_eq!(
            extract("RAOP: RTSP request successful with status 200"),
            Some(DomainEvent::Request(RequestOutcome::Success))
        );
    }

    #[test]
    fn test_request_failure_reasons() {
        let cases = [
            ("RTSP request failed: 403 Forbidden", FailureReason::Forbidden403),
            ("RTSP request failed: 500 Internal Error", FailureReason::InternalError500),
            ("RTSP request failed - Connection failed", FailureReason::ConnectionFailed),
            ("RTSP request failed: 404 Not Found", FailureReason::Other),
        ];
        for (line, reason) in cases {
            assert_eq!(
                extract(line),
                Some(DomainEvent::Request(RequestOutcome::Failed(reason))),
                "line: {line}"
            );
        }
    }

    #[test]
    fn test_failure_reason_precedence() {
        assert_eq!(
            extract("RTSP request failed: Connection failed after 500 Internal Error and 403 Forbidden"),
            Some(DomainEvent::Request(RequestOutcome::Failed(FailureReason::Forbidden403)))
        );
        assert_eq!(
            extract("RTSP request failed: Connection failed after 500 Internal Error"),
            Some(DomainEvent::Request(RequestOutcome::Failed(FailureReason::InternalError500)))
        );
    }

    #[test]
    fn test_reason_without_failure_marker_is_unmatched() {
        assert_eq!(extract("HTTP/1.1 403 Forbidden"), None);
    }

    #[test]
    fn test_auth_fields_are_case_sensitive() {
        assert_eq!(
            extract("Apple-Response: 3f9a0c"),
            Some(DomainEvent::Auth(AuthSignal::AppleResponsePresent))
        );
        assert_eq!(
            extract("a=rsaaeskey:AAAA"),
            Some(DomainEvent::Auth(AuthSignal::RsaAesKeyPresent))
        );
        assert_eq!(extract("a=aesiv:BBBB"), Some(DomainEvent::Auth(AuthSignal::AesIvPresent)));
        assert_eq!(extract("apple-response: 3f9a0c"), None);
        assert_eq!(extract("a=RSAAESKEY:AAAA"), None);
    }

    #[test]
    fn test_connection_attempt() {
        let now = Utc::now();
        let extractor = EventExtractor::new().unwrap();
        let event = extractor.extract_at("Attempting to connect to device: Kitchen (10.0.0.3:7000)", now);
        assert_eq!(
            event,
            Some(DomainEvent::ConnectionAttempt(ConnectionAttempt {
                target: "Kitchen (10.0.0.3:7000)".to_string(),
                observed_at: now,
            }))
        );
        assert_eq!(extractor.extract_at("Attempting to connect to device:   ", now), None);
    }

    #[test]
    fn test_first_rule_wins() {
        // A device line mentioning a request outcome is still a device
        let event = extract("Device found - RTSP request successful with status 200 at 1.2.3.4:7000");
        assert!(matches!(event, Some(DomainEvent::DeviceDiscovered(_))));

        // Success outranks a failure marker on the same line
        let event = extract("RTSP request successful with status 200 after RTSP request failed");
        assert_eq!(event, Some(DomainEvent::Request(RequestOutcome::Success)));

        // A malformed device line falls through to later rules
        let event = extract("Device found - TV at host:bad rsaaeskey:");
        assert_eq!(event, Some(DomainEvent::Auth(AuthSignal::RsaAesKeyPresent)));
    }

    #[test]
    fn test_unrelated_line() {
        assert_eq!(extract("Audio buffer underrun"), None);
        assert_eq!(extract(""), None);
    }
}
