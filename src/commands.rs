//! CLI command definitions
//!
//! Defines the clap commands for the castprobe CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Launch the application under test and monitor its log
    Run {
        /// Executable to launch (default: `target.program` from config)
        #[arg(long)]
        program: Option<PathBuf>,

        /// Arguments to pass to the program
        #[arg(last = true)]
        args: Vec<String>,

        /// Log file written by the program (default: test_log.txt)
        #[arg(long)]
        log: Option<PathBuf>,

        /// Seconds to monitor the log after discovery
        #[arg(long)]
        duration: Option<u64>,

        /// Seconds to wait for device discovery before monitoring
        #[arg(long)]
        grace: Option<u64>,

        /// Milliseconds between log polls
        #[arg(long)]
        tick_ms: Option<u64>,

        /// Milliseconds to wait for a graceful exit before killing the program
        #[arg(long)]
        stop_grace_ms: Option<u64>,

        /// Print log lines as they are observed
        #[arg(long)]
        echo: bool,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Analyze an existing log file without launching anything
    Analyze {
        /// Log file to analyze
        path: PathBuf,

        /// Number of recent connection attempts to show
        #[arg(long)]
        recent: Option<usize>,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that the plugin bundles and standalone app are installed
    Verify {
        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },
}
