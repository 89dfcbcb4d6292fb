//! Validate GQL documents without touching any data

use super::CliError;
use crate::compile;

/// Options for the check command
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// The GQL document text
    pub query: String,
}

/// Result of a successful check
#[derive(Debug)]
pub struct CheckResult {
    /// Root block output keys, in declaration order
    pub blocks: Vec<String>,
    /// Number of resolved macros
    pub macros: usize,
    /// Values passed to `print(...)` while resolving the global block
    pub printed: Vec<crate::Value>,
}

/// Lexes, resolves and parses the document.
pub fn execute_check(options: &CheckOptions) -> Result<CheckResult, CliError> {
    let compiled = compile(&options.query)?;
    Ok(CheckResult {
        blocks: compiled.document.tables.keys().cloned().collect(),
        macros: compiled.macros.len(),
        printed: compiled.printed,
    })
}
