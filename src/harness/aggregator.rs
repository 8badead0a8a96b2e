//! Folding events into running counters

use std::collections::{HashMap, VecDeque};

use super::events::{AuthSignal, ConnectionAttempt, Device, DomainEvent, FailureReason, RequestOutcome};
use super::report::{AuthCounts, Observations, RequestCounts};

/// Default number of connection attempts kept for the report
pub const DEFAULT_RECENT_ATTEMPTS: usize = 5;

/// Accumulates extracted events for one run
#[derive(Debug)]
pub struct ResultAggregator {
    devices: Vec<Device>,
    /// (host, port) -> index into `devices`
    device_index: HashMap<(String, u16), usize>,
    requests: RequestCounts,
    auth: AuthCounts,
    recent_attempts: VecDeque<ConnectionAttempt>,
    recent_capacity: usize,
    total_attempts: u64,
    unmatched_lines: u64,
    lines_seen: u64,
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_ATTEMPTS)
    }
}

impl ResultAggregator {
    /// Create an aggregator that keeps the last `recent_capacity` attempts
    pub fn new(recent_capacity: usize) -> Self {
        Self {
            devices: Vec::new(),
            device_index: HashMap::new(),
            requests: RequestCounts::default(),
            auth: AuthCounts::default(),
            recent_attempts: VecDeque::with_capacity(recent_capacity),
            recent_capacity,
            total_attempts: 0,
            unmatched_lines: 0,
            lines_seen: 0,
        }
    }

    /// Fold one event into the counters
    pub fn apply(&mut self, event: DomainEvent) {
        self.lines_seen += 1;
        match event {
            DomainEvent::DeviceDiscovered(device) => self.upsert_device(device),
            DomainEvent::Request(RequestOutcome::Success) => self.requests.success += 1,
            DomainEvent::Request(RequestOutcome::Failed(reason)) => {
                let counter = match reason {
                    FailureReason::Forbidden403 => &mut self.requests.forbidden_403,
                    FailureReason::InternalError500 => &mut self.requests.internal_error_500,
                    FailureReason::ConnectionFailed => &mut self.requests.connection_failed,
                    FailureReason::Other => &mut self.requests.other_failure,
                };
                *counter += 1;
            }
            DomainEvent::Auth(signal) => {
                let counter = match signal {
                    AuthSignal::AppleResponsePresent => &mut self.auth.apple_response,
                    AuthSignal::RsaAesKeyPresent => &mut self.auth.rsa_aes_key,
                    AuthSignal::AesIvPresent => &mut self.auth.aes_iv,
                };
                *counter += 1;
            }
            DomainEvent::ConnectionAttempt(attempt) => self.push_attempt(attempt),
        }
    }

    /// Count a non-empty line that produced no event
    pub fn record_unmatched(&mut self) {
        self.lines_seen += 1;
        self.unmatched_lines += 1;
    }

    /// Current view of everything aggregated so far
    pub fn snapshot(&self) -> Observations {
        Observations {
            devices: self.devices.clone(),
            requests: self.requests,
            auth: self.auth,
            recent_attempts: self.recent_attempts.iter().cloned().collect(),
            total_attempts: self.total_attempts,
            unmatched_lines: self.unmatched_lines,
            lines_seen: self.lines_seen,
        }
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    fn upsert_device(&mut self, device: Device) {
        let key = (device.host.clone(), device.port);
        match self.device_index.get(&key) {
            Some(&idx) => {
                let known = &mut self.devices[idx];
                if known.name != device.name {
                    tracing::debug!(
                        host = %device.host,
                        port = device.port,
                        old = %known.name,
                        new = %device.name,
                        "Device renamed"
                    );
                    known.name = device.name;
                }
            }
            None => {
                tracing::debug!(name = %device.name, host = %device.host, port = device.port, "Device discovered");
                self.device_index.insert(key, self.devices.len());
                self.devices.push(device);
            }
        }
    }

    fn push_attempt(&mut self, attempt: ConnectionAttempt) {
        self.total_attempts += 1;
        if self.recent_capacity == 0 {
            return;
        }
        if self.recent_attempts.len() >= self.recent_capacity {
            self.recent_attempts.pop_front();
        }
        self.recent_attempts.push_back(attempt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn device(name: &str, host: &str, port: u16) -> DomainEvent {
        DomainEvent::DeviceDiscovered(Device {
            name: name.to_string(),
            host: host.to_string(),
            port,
        })
    }

    fn attempt(target: &str) -> DomainEvent {
        DomainEvent::ConnectionAttempt(ConnectionAttempt {
            target: target.to_string(),
            observed_at: Utc::now(),
        })
    }

    #[test]
    fn test_devices_upsert_by_host_and_port() {
        let mut agg = ResultAggregator::default();
        agg.apply(device("Living Room TV", "192.168.1.5", 7000));
        agg.apply(device("Living Room TV", "192.168.1.5", 7000));
        assert_eq!(agg.devices().len(), 1);

        agg.apply(device("Lounge", "192.168.1.5", 7000));
        assert_eq!(agg.devices().len(), 1);
        assert_eq!(agg.devices()[0].name, "Lounge");

        agg.apply(device("Lounge", "192.168.1.5", 7001));
        agg.apply(device("Lounge", "192.168.1.6", 7000));
        assert_eq!(agg.devices().len(), 3);
    }

    #[test]
    fn test_success_touches_only_success() {
        let mut agg = ResultAggregator::default();
        agg.apply(DomainEvent::Request(RequestOutcome::Success));
        let obs = agg.snapshot();
        assert_eq!(
            obs.requests,
            RequestCounts {
                success: 1,
                ..Default::default()
            }
        );
        assert_eq!(obs.auth, AuthCounts::default());
        assert_eq!(obs.unmatched_lines, 0);
        assert_eq!(obs.total_attempts, 0);
        assert!(obs.devices.is_empty());
    }

    #[test]
    fn test_failures_count_per_reason() {
        let mut agg = ResultAggregator::default();
        agg.apply(DomainEvent::Request(RequestOutcome::Failed(FailureReason::Forbidden403)));
        agg.apply(DomainEvent::Request(RequestOutcome::Failed(FailureReason::Forbidden403)));
        agg.apply(DomainEvent::Request(RequestOutcome::Failed(FailureReason::Other)));
        let requests = agg.snapshot().requests;
        assert_eq!(requests.forbidden_403, 2);
        assert_eq!(requests.other_failure, 1);
        assert_eq!(requests.failed(), 3);
        assert_eq!(requests.success, 0);
    }

    #[test]
    fn test_auth_signals_are_counted_not_deduplicated() {
        let mut agg = ResultAggregator::default();
        agg.apply(DomainEvent::Auth(AuthSignal::AesIvPresent));
        agg.apply(DomainEvent::Auth(AuthSignal::AesIvPresent));
        agg.apply(DomainEvent::Auth(AuthSignal::AppleResponsePresent));
        let auth = agg.snapshot().auth;
        assert_eq!(auth.aes_iv, 2);
        assert_eq!(auth.apple_response, 1);
        assert_eq!(auth.rsa_aes_key, 0);
    }

    #[test]
    fn test_attempt_window_is_bounded() {
        let mut agg = ResultAggregator::new(5);
        for i in 0..8 {
            agg.apply(attempt(&format!("device-{i}")));
        }
        let obs = agg.snapshot();
        assert_eq!(obs.total_attempts, 8);
        let targets: Vec<_> = obs.recent_attempts.iter().map(|a| a.target.as_str()).collect();
        assert_eq!(targets, ["device-3", "device-4", "device-5", "device-6", "device-7"]);
    }

    #[test]
    fn test_zero_window_still_counts() {
        let mut agg = ResultAggregator::new(0);
        agg.apply(attempt("tv"));
        let obs = agg.snapshot();
        assert_eq!(obs.total_attempts, 1);
        assert!(obs.recent_attempts.is_empty());
    }

    #[test]
    fn test_snapshot_does_not_mutate() {
        let mut agg = ResultAggregator::default();
        agg.record_unmatched();
        let first = agg.snapshot();
        let second = agg.snapshot();
        assert_eq!(first, second);
        assert_eq!(first.unmatched_lines, 1);
        assert_eq!(first.lines_seen, 1);
    }
}
