mod args;
mod handlers;

pub use args::{Cli, Command, OutputFormat};

use anyhow::Result;
use ward_core::config::Config;
use ward_core::paths::{WardPaths, resolve_root};

/// Dispatch a parsed CLI invocation; returns the process exit code.
pub fn run(cli: Cli) -> Result<i32> {
    let root = resolve_root(cli.root.as_deref())?;
    let paths = WardPaths::new(root);
    let config = Config::load_from(&paths.config_file()).unwrap_or_else(|err| {
        eprintln!("ward: config unreadable ({err}), using defaults");
        Config::default()
    });

    match cli.command {
        Command::Hook => Ok(handlers::hook::run(paths, config)),
        Command::Track { session } => handlers::track::run(&paths, &session),
        Command::Stats { format } => handlers::stats::run(&paths, format),
        Command::Gc { max_age_days } => {
            handlers::gc::run(&paths, max_age_days.unwrap_or(config.gc_max_age_days))
        }
    }
}
