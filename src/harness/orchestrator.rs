//! Harness run state machine
//!
//! ```text
//! Idle -> Starting -> AwaitingDiscovery -> Monitoring -> Stopping -> Done
//!            |               |                 |
//!            |               +--> Cancelling <-+
//!            |                        |
//!            +--> Done (launch error) +--> Stopping
//! ```
//!
//! The orchestrator owns the log cursor, line assembler and aggregator
//! outright; nothing else touches them, so none of it is locked. Once the
//! target has started, `stop` runs exactly once whichever way the run ends.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::aggregator::ResultAggregator;
use super::extractor::EventExtractor;
use super::report::{ProcessExit, Report, RunStatus};
use super::supervisor::{ProcessSupervisor, StopOutcome};
use super::tailer::{self, LineAssembler, LogCursor};
use crate::common::{Error, Result};

/// Timing of a harness run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarnessTiming {
    /// Wait after launch so the target can discover devices
    pub grace_delay: Duration,
    /// Interval between log polls
    pub tick_interval: Duration,
    /// Length of the monitoring window
    pub monitor_duration: Duration,
    /// Wait after a graceful stop request before killing the target
    pub stop_grace_timeout: Duration,
}

impl Default for HarnessTiming {
    fn default() -> Self {
        Self {
            grace_delay: Duration::from_secs(10),
            tick_interval: Duration::from_secs(1),
            monitor_duration: Duration::from_secs(30),
            stop_grace_timeout: Duration::from_secs(5),
        }
    }
}

/// Harness run state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessState {
    Idle,
    Starting,
    AwaitingDiscovery,
    Monitoring,
    Cancelling,
    Stopping,
    Done,
}

impl std::fmt::Display for HarnessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Starting => write!(f, "starting"),
            Self::AwaitingDiscovery => write!(f, "awaiting discovery"),
            Self::Monitoring => write!(f, "monitoring"),
            Self::Cancelling => write!(f, "cancelling"),
            Self::Stopping => write!(f, "stopping"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// What to launch
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

type LineObserver = Box<dyn FnMut(&str) + Send>;

/// Drives one harness run
///
/// [`run`](Self::run) consumes the orchestrator: every run starts from a
/// fresh cursor and aggregator.
pub struct TestOrchestrator<S: ProcessSupervisor> {
    supervisor: S,
    launch: LaunchSpec,
    log_path: PathBuf,
    timing: HarnessTiming,
    cancel: CancellationToken,
    extractor: EventExtractor,
    aggregator: ResultAggregator,
    cursor: LogCursor,
    lines: LineAssembler,
    state: HarnessState,
    process_exit: Option<ProcessExit>,
    observer: Option<LineObserver>,
    ticks: u64,
    log_unreadable: bool,
}

impl<S: ProcessSupervisor> TestOrchestrator<S> {
    pub fn new(
        supervisor: S,
        launch: LaunchSpec,
        log_path: impl Into<PathBuf>,
        timing: HarnessTiming,
        recent_attempts: usize,
    ) -> Result<Self> {
        Ok(Self {
            supervisor,
            launch,
            log_path: log_path.into(),
            timing,
            cancel: CancellationToken::new(),
            extractor: EventExtractor::new()?,
            aggregator: ResultAggregator::new(recent_attempts),
            cursor: LogCursor::default(),
            lines: LineAssembler::new(),
            state: HarnessState::Idle,
            process_exit: None,
            observer: None,
            ticks: 0,
            log_unreadable: false,
        })
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Call `observer` with every non-empty line as it is observed
    pub fn on_line(mut self, observer: impl FnMut(&str) + Send + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Token that cancels this run
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute the run and produce its report
    pub async fn run(mut self) -> Report {
        let started = Instant::now();

        self.transition(HarnessState::Starting);
        let mut handle = match self
            .supervisor
            .start(&self.launch.program, &self.launch.args)
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!("Launch failed: {}", e);
                self.transition(HarnessState::Done);
                return Report::launch_failed(e);
            }
        };

        self.transition(HarnessState::AwaitingDiscovery);
        let status = if self.await_discovery().await {
            self.transition(HarnessState::Monitoring);
            self.monitor(&mut handle).await
        } else {
            RunStatus::Cancelled
        };

        if status == RunStatus::Cancelled {
            tracing::info!(ticks = self.ticks, "Run cancelled, stopping target");
            self.transition(HarnessState::Cancelling);
        }

        self.transition(HarnessState::Stopping);
        let outcome = self
            .supervisor
            .stop(&mut handle, self.timing.stop_grace_timeout)
            .await;
        match outcome {
            StopOutcome::AlreadyExited(exit) => self.note_exit(exit),
            StopOutcome::Graceful(exit) if self.process_exit.is_none() => {
                self.process_exit = Some(exit);
            }
            _ => {}
        }

        // Pick up whatever the target wrote while shutting down
        if status == RunStatus::Completed {
            self.poll_log();
            if let Some(line) = self.lines.finish() {
                self.ingest(&line);
            }
        }

        self.transition(HarnessState::Done);
        Report {
            status,
            error: None,
            complete: true,
            observations: self.aggregator.snapshot(),
            process_exit: self.process_exit,
            ticks: self.ticks,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Returns false if cancelled during the grace period
    async fn await_discovery(&mut self) -> bool {
        tracing::info!(
            grace_secs = self.timing.grace_delay.as_secs_f64(),
            "Waiting for device discovery"
        );
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.timing.grace_delay) => true,
        }
    }

    async fn monitor(&mut self, handle: &mut S::Handle) -> RunStatus {
        tracing::info!(
            duration_secs = self.timing.monitor_duration.as_secs_f64(),
            "Monitoring {}",
            self.log_path.display()
        );

        let deadline = deadline_after(self.timing.monitor_duration);
        let mut interval = tokio::time::interval(self.timing.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {}
                _ = interval.tick() => {}
            }

            if self.cancel.is_cancelled() {
                return RunStatus::Cancelled;
            }
            if Instant::now() >= deadline {
                tracing::info!(ticks = self.ticks, "Monitoring completed");
                return RunStatus::Completed;
            }

            self.ticks += 1;
            tracing::trace!(tick = self.ticks, offset = self.cursor.byte_offset(), "Tick");
            self.poll_log();

            if self.ticks == 1 {
                self.log_discovery();
            }

            if self.process_exit.is_none() {
                if let Some(exit) = self.supervisor.try_exit(handle) {
                    self.note_exit(exit);
                }
            }
        }
    }

    fn poll_log(&mut self) {
        match tailer::poll(&self.log_path, self.cursor) {
            Ok(chunk) => {
                if chunk.truncated {
                    self.lines.reset();
                }
                self.cursor = chunk.cursor;
                for line in self.lines.push(&chunk.bytes) {
                    self.ingest(&line);
                }
                self.log_unreadable = false;
            }
            Err(e) => {
                if !self.log_unreadable {
                    tracing::warn!("{}; retrying every tick", e);
                    self.log_unreadable = true;
                }
            }
        }
    }

    fn ingest(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        if let Some(observer) = self.observer.as_mut() {
            observer(line);
        }
        match self.extractor.extract(line) {
            Some(event) => self.aggregator.apply(event),
            None => self.aggregator.record_unmatched(),
        }
    }

    fn log_discovery(&self) {
        let devices = self.aggregator.devices();
        tracing::info!("Discovered {} devices", devices.len());
        for device in devices {
            tracing::info!("  {} at {}:{}", device.name, device.host, device.port);
        }
    }

    fn note_exit(&mut self, exit: ProcessExit) {
        if self.process_exit.is_some() {
            return;
        }
        if exit.success() {
            tracing::info!(%exit, "Target exited");
        } else {
            tracing::warn!(%exit, "Target exited unexpectedly, still collecting its log");
        }
        self.process_exit = Some(exit);
    }

    fn transition(&mut self, to: HarnessState) {
        tracing::debug!(from = %self.state, to = %to, "Harness state");
        self.state = to;
    }
}

/// `now + duration`, saturating at roughly 30 years out
fn deadline_after(duration: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(duration)
        .unwrap_or_else(|| now + Duration::from_secs(FAR_FUTURE_SECS))
}

const FAR_FUTURE_SECS: u64 = 86_400 * 365 * 30;

/// Analyze an existing log file in one pass without launching anything
pub fn analyze_log(path: &Path, recent_attempts: usize) -> Result<Report> {
    if !path.exists() {
        return Err(Error::FileRead {
            path: path.display().to_string(),
            error: "file not found".to_string(),
        });
    }

    let started = std::time::Instant::now();
    let extractor = EventExtractor::new()?;
    let mut aggregator = ResultAggregator::new(recent_attempts);
    let mut lines = LineAssembler::new();

    let chunk = tailer::poll(path, LogCursor::default())?;
    let mut all = lines.push(&chunk.bytes);
    all.extend(lines.finish());

    for line in all.iter().filter(|l| !l.trim().is_empty()) {
        match extractor.extract(line) {
            Some(event) => aggregator.apply(event),
            None => aggregator.record_unmatched(),
        }
    }

    Ok(Report {
        status: RunStatus::Analyzed,
        error: None,
        complete: true,
        observations: aggregator.snapshot(),
        process_exit: None,
        ticks: 0,
        elapsed_ms: started.elapsed().as_millis() as u64,
    })
}
