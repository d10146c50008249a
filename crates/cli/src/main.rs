// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use clap::Parser;
use flock::{Cli, Command};

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.global.verbose, matches!(cli.command, Command::Watch { .. }));

    if let Err(e) = flock::run(&cli.global, cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr so command output stays scriptable. `RUST_LOG` wins over
/// the defaults.
fn setup_logging(verbose: bool, long_running: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose {
        "debug"
    } else if long_running {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
