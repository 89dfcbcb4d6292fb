//! CLI support for gql-lang
//!
//! Provides programmatic access to the `gql` commands so other tools can
//! embed them without shelling out.

mod check;
mod run;

pub use check::{CheckOptions, CheckResult, execute_check};
pub use run::{RunOptions, RunOutput, execute_run};

use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Query(#[from] crate::Error),

    #[error("Failed to read {}: {source}", .path.display())]
    ReadQuery {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Data directory {} does not exist", .0.display())]
    MissingDataDir(PathBuf),

    /// No query file and nothing piped on stdin
    #[error("No query provided. Pass a query file or pipe one to stdin.")]
    NoInput,
}

/// Renders `print(...)` values one per line, the way the runner echoes them.
pub fn format_printed(printed: &[crate::Value]) -> Vec<String> {
    printed.iter().map(|v| v.to_string()).collect()
}
