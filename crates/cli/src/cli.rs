// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use fk_core::Operation;

use crate::relay::Role;

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

// Custom help template that groups commands into sections
const HELP_TEMPLATE: &str = "{about-with-newline}
{usage-heading} {usage}

{before-help}Options:
{options}{after-help}";

const COMMANDS_HELP: &str = "\
Writes:
  enqueue       Queue a write for the remote store
  pending       List queued writes
  drain         Send queued writes now
  dead-letters  Inspect, requeue or discard rejected writes

Session:
  status        Show connectivity and queue state
  watch         Run the sync worker and relay remote changes

Setup:
  config        Manage configuration";

const QUICKSTART_HELP: &str = "\
Get started:
  flock config remote ws://host:7890                Point at the remote store
  flock enqueue members insert '{\"name\":\"Ada\"}'   Queue a write
  flock status                                      See what is pending
  flock watch --role leader                         Keep syncing in the foreground";

#[derive(Parser)]
#[command(name = "flock")]
#[command(version)]
#[command(about = "Offline-tolerant write queue and sync engine for congregation records")]
#[command(help_template = HELP_TEMPLATE)]
#[command(before_help = COMMANDS_HELP)]
#[command(after_help = QUICKSTART_HELP)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options accepted by every command.
#[derive(Args, Clone, Debug, Default)]
pub struct GlobalArgs {
    /// State directory holding the queue and config (default: $FLOCK_STATE_DIR
    /// or ~/.local/state/flock)
    #[arg(long, global = true, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Queue a write for the remote store
    #[command(after_help = "Examples:\n  \
        flock enqueue members insert '{\"name\":\"Ada\"}'         Add a member\n  \
        flock enqueue members update '{\"id\":7,\"phone\":\"555\"}'  Change a field\n  \
        flock enqueue events delete '{\"id\":3}'                  Remove an event\n\n\
        Update and delete payloads must carry the record's \"id\".")]
    Enqueue {
        /// Target collection (e.g. members, attendance)
        table: String,

        /// Mutation kind: insert, update or delete
        operation: Operation,

        /// Row data as a JSON object
        payload: String,
    },

    /// Show connectivity and queue state
    Status {
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// List queued writes in the order they will be sent
    Pending {
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// Send queued writes now
    Drain,

    /// Inspect, requeue or discard writes the remote kept rejecting
    DeadLetters {
        /// Move every dead letter back to the queue
        #[arg(long, conflicts_with = "discard")]
        requeue: bool,

        /// Drop every dead letter
        #[arg(long)]
        discard: bool,

        #[arg(long, short, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// Run the sync worker and relay remote changes until interrupted
    Watch {
        /// Role of the signed-in user; admins and leaders see prayer request notices
        #[arg(long, default_value = "member")]
        role: Role,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Set the remote store URL
    Remote {
        /// WebSocket URL (ws:// or wss://)
        url: String,
    },
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
