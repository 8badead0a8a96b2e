//! Text and JSON rendering of reports

use chrono::Local;
use colored::Colorize;

use crate::common::config::Config;
use crate::common::Result;
use crate::harness::{Report, RunStatus, Verdict};

/// Print what a run is about to do
pub fn print_banner(config: &Config) {
    println!(
        "\n{} {}",
        "Casting Conformance Run:".blue().bold(),
        config.plugin_name.white().bold()
    );
    println!("  Program: {}", config.target.program.display().to_string().dimmed());
    println!("  Log:     {}", config.log.path.display().to_string().dimmed());
    println!(
        "  Timing:  {}s discovery, {}s monitoring",
        config.timing.discovery_grace_secs, config.timing.monitor_duration_secs
    );
}

/// Print one observed log line with the local time it was seen
pub fn echo_line(line: &str) {
    println!("[{}] {}", Local::now().format("%H:%M:%S"), line);
}

/// Print a report as text or JSON
pub fn print_report(report: &Report, json: bool) -> Result<()> {
    if json {
        let mut value = serde_json::to_value(report)?;
        value["verdict"] = serde_json::to_value(report.verdict())?;
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    print_text(report);
    Ok(())
}

fn print_text(report: &Report) {
    if report.status == RunStatus::LaunchFailed {
        println!(
            "\n{} {}",
            "✗ Launch failed:".red().bold(),
            report.error.as_deref().unwrap_or("unknown error")
        );
        println!("  {}", "Report incomplete, nothing was observed".dimmed());
        return;
    }

    let obs = &report.observations;

    println!("\n{}", "Devices:".cyan());
    if obs.devices.is_empty() {
        println!("  {}", "none discovered".dimmed());
    }
    for device in &obs.devices {
        println!("  - {} at {}:{}", device.name, device.host, device.port);
    }

    let requests = &obs.requests;
    println!("\n{}", "RTSP Requests:".cyan());
    println!("  {} Successful: {}", "✓".green(), requests.success);
    println!("  {} Failed:     {}", "✗".red(), requests.failed());
    let breakdown = [
        ("403 Forbidden", requests.forbidden_403),
        ("500 Internal Error", requests.internal_error_500),
        ("Connection failed", requests.connection_failed),
        ("Other", requests.other_failure),
    ];
    for (label, count) in breakdown.iter().filter(|(_, count)| *count > 0) {
        println!("      - {}: {}", label, count);
    }

    println!("\n{}", "Authentication:".cyan());
    println!("  - Apple-Response headers: {}", obs.auth.apple_response);
    println!("  - RSA AES key fields:     {}", obs.auth.rsa_aes_key);
    println!("  - AES IV fields:          {}", obs.auth.aes_iv);

    println!(
        "\n{} {}",
        "Recent Connection Attempts:".cyan(),
        format!("({} total)", obs.total_attempts).dimmed()
    );
    for attempt in &obs.recent_attempts {
        println!(
            "  - {} {}",
            attempt.target,
            attempt.observed_at.with_timezone(&Local).format("%H:%M:%S").to_string().dimmed()
        );
    }

    println!("\n{}", "Diagnostics:".cyan());
    println!("  Lines seen:      {}", obs.lines_seen);
    println!("  Unmatched lines: {}", obs.unmatched_lines);
    if report.status != RunStatus::Analyzed {
        println!("  Ticks:           {}", report.ticks);
        println!("  Elapsed:         {:.1}s", report.elapsed_ms as f64 / 1000.0);
    }
    if let Some(exit) = &report.process_exit {
        println!("  Target exited:   {}", exit);
    }

    let verdict = report.verdict();
    let label = match verdict {
        Verdict::Pass => verdict.to_string().green().bold(),
        Verdict::Fail => verdict.to_string().red().bold(),
        Verdict::Inconclusive => verdict.to_string().yellow().bold(),
    };
    let suffix = if report.status == RunStatus::Cancelled {
        " (interrupted, partial results)"
    } else {
        ""
    };
    println!("\n{} {}{}\n", "Result:".bold(), label, suffix.dimmed());
}
