//! Bridge to the external Claude Code CLI
//!
//! - `command`: mutation kinds and their argument tokens
//! - `runner`: process execution with timeout

pub mod command;
pub mod runner;

pub use command::{display_command, Mutation, MutationKind};
pub use runner::{ClaudeCli, CliResult, CliRunner, RunOptions, SENTINEL_EXIT_CODE};
