//! castprobe - conformance harness for AirPlay casting applications
//!
//! Launches the application under test, follows the log it writes and
//! reports what it discovered, attempted and authenticated.

use std::path::PathBuf;

use castprobe::common::{config::Config, logging};
use castprobe::{cli, commands::Commands};
use clap::Parser;

#[derive(Parser)]
#[command(name = "castprobe", about = "Log-driven casting conformance harness")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: platform config dir/castprobe/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase diagnostic output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Also write diagnostics to the castprobe log file
    #[arg(long, global = true)]
    log_file: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let guard = logging::init_cli(cli.verbose, cli.log_file || config.logging.file);
    if let Some((path, _)) = &guard {
        tracing::debug!(path = %path.display(), "Writing diagnostics to file");
    }

    let code = match cli::dispatch(cli.command, config).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    };

    // Flush the diagnostics file before exiting
    drop(guard);
    std::process::exit(code);
}
