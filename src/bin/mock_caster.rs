//! Mock casting application for integration testing
//!
//! Appends a scripted discovery/connection session to a log file the way
//! the real application does, chatters on stdout, then idles until it is
//! told to stop.
//!
//! Usage: `mock_caster <log_path> [--delay-ms N] [--exit-code N]`
//!
//! With `--exit-code` the mock exits on its own after writing the script
//! instead of idling.

use std::fs::OpenOptions;
use std::io::Write;
use std::thread;
use std::time::Duration;

const SCRIPT: &[&str] = &[
    "FreeCaster starting",
    "Device found - Living Room TV at 192.168.1.5:7000",
    "Device found - Kitchen Speaker at 192.168.1.9:7000",
    "Attempting to connect to device: Living Room TV",
    "RTSP OPTIONS rtsp://192.168.1.5/ RTSP/1.0",
    "Apple-Response: 4b1d5a3c",
    "RTSP request successful with status 200",
    "a=rsaaeskey:VGhpcyBpcyBub3QgYSByZWFsIGtleQ",
    "a=aesiv:MDAxMTIyMzM0NDU1NjY3Nw",
    "RTSP request successful with status 200",
    "Attempting to connect to device: Kitchen Speaker",
    "RTSP request failed: 403 Forbidden",
];

fn main() {
    let mut args = std::env::args().skip(1);
    let Some(log_path) = args.next() else {
        eprintln!("usage: mock_caster <log_path> [--delay-ms N] [--exit-code N]");
        std::process::exit(2);
    };

    let mut delay = Duration::from_millis(20);
    let mut exit_code: Option<i32> = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--delay-ms" => {
                if let Some(ms) = args.next().and_then(|v| v.parse().ok()) {
                    delay = Duration::from_millis(ms);
                }
            }
            "--exit-code" => exit_code = args.next().and_then(|v| v.parse().ok()),
            other => eprintln!("mock_caster: ignoring argument {other}"),
        }
    }

    let mut log = match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("mock_caster: cannot open {log_path}: {e}");
            std::process::exit(2);
        }
    };

    let stdout = std::io::stdout();
    for line in SCRIPT {
        // Write each record in two pieces so readers see partial lines
        let (head, tail) = line.split_at(line.len() / 2);
        let _ = log.write_all(head.as_bytes());
        let _ = log.flush();
        let _ = writeln!(log, "{tail}");
        let _ = log.flush();

        // Enough stdout noise to fill an undrained pipe
        let mut out = stdout.lock();
        for _ in 0..64 {
            let _ = writeln!(out, "audio frame {:0>120}", line.len());
        }
        drop(out);

        thread::sleep(delay);
    }

    if let Some(code) = exit_code {
        std::process::exit(code);
    }

    loop {
        thread::sleep(Duration::from_millis(100));
    }
}
