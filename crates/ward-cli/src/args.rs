use clap::{Parser, Subcommand, ValueEnum};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum OutputFormat {
    Plain,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Plain => write!(f, "plain"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "ward",
    version,
    about = "Tool-call enforcement and telemetry for AI coding agents"
)]
pub struct Cli {
    /// Data root override (default: WARD_PATH, then the XDG data dir)
    #[arg(long, global = true)]
    pub root: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Evaluate one hook invocation (JSON payload on stdin)
    ///
    /// Exit 0 = allow or ask, exit 2 = deny. Any internal failure
    /// allows: the only way to deny is a gate that ran to completion.
    Hook,

    /// Merge a session's pending sideband into its durable state
    Track {
        /// Session id whose sideband to merge
        #[arg(long)]
        session: String,
    },

    /// Show circuit, timing, audit, and queue rollups
    Stats {
        #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
        format: OutputFormat,
    },

    /// Delete state for sessions idle longer than the cutoff
    Gc {
        /// Override the configured idle cutoff
        #[arg(long)]
        max_age_days: Option<u64>,
    },
}
