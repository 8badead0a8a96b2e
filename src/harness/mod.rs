//! Log-driven conformance harness
//!
//! Launches the application under test, follows the log it writes, turns
//! recognised lines into domain events and folds them into a [`Report`].

pub mod aggregator;
pub mod events;
pub mod extractor;
pub mod orchestrator;
pub mod report;
pub mod supervisor;
pub mod tailer;

pub use aggregator::ResultAggregator;
pub use events::{AuthSignal, ConnectionAttempt, Device, DomainEvent, FailureReason, RequestOutcome};
pub use extractor::EventExtractor;
pub use orchestrator::{analyze_log, HarnessState, HarnessTiming, LaunchSpec, TestOrchestrator};
pub use report::{Observations, ProcessExit, Report, RunStatus, Verdict};
pub use supervisor::{ChildSupervisor, ProcessSupervisor, StopOutcome};
pub use tailer::{LineAssembler, LogCursor, TailChunk};
