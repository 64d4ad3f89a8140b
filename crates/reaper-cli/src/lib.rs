//! Reaper CLI library.
//!
//! Command-line front end for the janitor: run it against a record snapshot,
//! preview its decisions, or fingerprint a policy document.

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::{Cli, Command};
pub use error::{CliError, Result};
pub use output::{Formatter, OutputFormat};
