//! Installation checks for the application under test
//!
//! `castprobe verify` reports whether the plugin bundles and standalone app
//! are where the host applications expect them, then prints how to try the
//! plugin by hand.

pub mod verifier;

use colored::Colorize;

use crate::common::config::Config;
use crate::common::Result;
use verifier::VerifyResult;

/// Host-side steps for exercising the plugin manually
const USAGE_STEPS: [&str; 5] = [
    "Open your DAW (e.g. Ableton Live 11)",
    "Create a new audio track",
    "Add the plugin as an Audio Effect",
    "Look for the two vertical meters on the right side",
    "Click 'Test Meters' to verify functionality",
];

/// Run the verify command, returning whether every artifact was found
pub fn run(config: &Config, json: bool) -> Result<bool> {
    let results = verifier::verify_artifacts(&config.artifacts());
    let all_found = results.iter().all(|r| r.found);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "plugin": config.plugin_name,
                "success": all_found,
                "artifacts": results,
            }))?
        );
        return Ok(all_found);
    }

    print_results(&config.plugin_name, &results);
    Ok(all_found)
}

fn print_results(plugin: &str, results: &[VerifyResult]) {
    println!("\n{} {}", "Verifying".blue().bold(), plugin.white().bold());

    for result in results {
        if result.found {
            println!("  {} {} found", "✓".green(), result.name);
        } else {
            println!(
                "  {} {} not found at {}",
                "✗".red(),
                result.name,
                result.path.display().to_string().dimmed()
            );
        }
    }

    if results.iter().any(|r| !r.found) {
        return;
    }

    println!("\n{}", "Installation Summary:".cyan());
    for result in results {
        if let Some(note) = &result.note {
            println!("  • {}: {}", result.name, note);
        }
    }

    println!("\n{}", "Testing Instructions:".cyan());
    for (i, step) in USAGE_STEPS.iter().enumerate() {
        println!("  {}. {}", i + 1, step);
    }
}
