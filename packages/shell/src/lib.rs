//! # mosaic-shell
//!
//! The `mosaic` command-line host. It reads a remotes config, then lists,
//! loads, preloads or probes the remotes of one environment.
//!
//! ```bash
//! mosaic --config remotes.json --env development remotes
//! mosaic --env development load users --tenant acme
//! mosaic preload users settings
//! mosaic health --watch --interval 10
//! ```
//!
//! Entries ending in `.wasm` (or starting with the WebAssembly magic number)
//! are instantiated as components; anything else is read as a JSON manifest.

pub mod cli;
pub mod commands;
pub mod evaluator;
pub mod render;

mod error;

pub use cli::{log_filter, Cli, Command};
pub use commands::execute;
pub use error::{Result, ShellError};
pub use evaluator::DispatchEvaluator;
