//! Command-line arguments.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use mosaic_federation::Environment;

/// mosaic - load and inspect federated remotes from the command line
#[derive(Parser, Debug)]
#[command(name = "mosaic")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Remotes config file: a JSON object of environment -> remote name -> entry
    #[arg(short, long, env = "MOSAIC_CONFIG", default_value = "remotes.json")]
    pub config: PathBuf,

    /// Environment whose remotes are used
    #[arg(short, long, env = "MOSAIC_ENV", default_value_t = Environment::Production)]
    pub env: Environment,

    /// Timeout for fetching one remote entry, in milliseconds
    #[arg(long, default_value_t = 10_000)]
    pub timeout_ms: u64,

    /// More logging (-v info, -vv debug, -vvv trace). RUST_LOG applies when absent.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List the configured remotes
    Remotes,

    /// Load a remote and print the component it exposes
    Load {
        name: String,

        /// Select this tenant in the shared store before loading
        #[arg(long)]
        tenant: Option<String>,
    },

    /// Fetch remote entries ahead of loading them
    Preload {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Probe every remote entry URL
    Health {
        /// Keep probing and report changes until interrupted
        #[arg(long)]
        watch: bool,

        /// Seconds between rounds in watch mode
        #[arg(long, default_value_t = 5)]
        interval: u64,

        /// Per-probe timeout in milliseconds
        #[arg(long, default_value_t = 3_000)]
        probe_timeout_ms: u64,
    },
}

/// Log filter directive for a `-v` count, or `None` to defer to `RUST_LOG`.
pub fn log_filter(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug,hyper=warn,h2=warn,reqwest=warn,cranelift_codegen=warn,wasmtime=warn"),
        _ => Some("trace"),
    }
}
