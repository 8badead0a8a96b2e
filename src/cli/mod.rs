//! CLI command handling
//!
//! Builds a harness run from config and flags, wires operator interrupts to
//! its cancellation token, and renders the resulting report.

mod render;

use tokio_util::sync::CancellationToken;

use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::Result;
use crate::harness::{self, ChildSupervisor, LaunchSpec, TestOrchestrator, Verdict};
use crate::setup;

/// Dispatch a CLI command
///
/// Returns whether the command succeeded; a failed verdict or a missing
/// artifact is not an error but still exits non-zero.
pub async fn dispatch(command: Commands, mut config: Config) -> Result<bool> {
    match command {
        Commands::Run {
            program,
            args,
            log,
            duration,
            grace,
            tick_ms,
            stop_grace_ms,
            echo,
            json,
        } => {
            if let Some(program) = program {
                config.target.program = program;
                config.target.args = args;
            } else if !args.is_empty() {
                config.target.args = args;
            }
            if let Some(log) = log {
                config.log.path = log;
            }
            if let Some(secs) = duration {
                config.timing.monitor_duration_secs = secs;
            }
            if let Some(secs) = grace {
                config.timing.discovery_grace_secs = secs;
            }
            if let Some(ms) = tick_ms {
                config.timing.tick_interval_ms = ms;
            }
            if let Some(ms) = stop_grace_ms {
                config.timing.stop_grace_ms = ms;
            }
            if echo {
                config.log.echo_lines = true;
            }

            run(&config, json).await
        }

        Commands::Analyze { path, recent, json } => {
            let recent = recent.unwrap_or(config.log.recent_attempts);
            let report = harness::analyze_log(&path, recent)?;
            render::print_report(&report, json)?;
            Ok(report.verdict() != Verdict::Fail)
        }

        Commands::Verify { json } => setup::run(&config, json),
    }
}

/// Launch, monitor and report
async fn run(config: &Config, json: bool) -> Result<bool> {
    let timing = config.timing()?;
    let launch = LaunchSpec {
        program: config.target.program.clone(),
        args: config.target.args.clone(),
    };
    let supervisor = ChildSupervisor::new().with_working_dir(config.target.working_dir.clone());

    let mut orchestrator = TestOrchestrator::new(
        supervisor,
        launch,
        &config.log.path,
        timing,
        config.log.recent_attempts,
    )?;
    if config.log.echo_lines && !json {
        orchestrator = orchestrator.on_line(render::echo_line);
    }

    if !json {
        render::print_banner(config);
    }

    let signals = tokio::spawn(cancel_on_signal(orchestrator.cancellation_token()));
    let report = orchestrator.run().await;
    signals.abort();

    render::print_report(&report, json)?;
    Ok(report.verdict() != Verdict::Fail)
}

/// Cancel `token` on SIGINT or SIGTERM
#[cfg(unix)]
async fn cancel_on_signal(token: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(term), Ok(int)) => (term, int),
        _ => {
            tracing::warn!("Could not install signal handlers; interrupts will not stop the run cleanly");
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, stopping run"),
        _ = sigint.recv() => tracing::info!("Received SIGINT (Ctrl+C), stopping run"),
    }
    token.cancel();
}

/// Cancel `token` on Ctrl+C
#[cfg(not(unix))]
async fn cancel_on_signal(token: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Received Ctrl+C, stopping run");
        token.cancel();
    }
}
