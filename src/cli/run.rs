//! Execute GQL documents against a data directory

use std::path::PathBuf;

use super::CliError;
use crate::{
    DirectorySource, SqliteSource, compile,
    executor::{ExecError, run_document},
    output::{document_value, to_json, to_json_pretty},
};

/// Options for the run command
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// The GQL document text
    pub query: String,
    /// Directory holding `<table>.csv`, `.json` or `.jsonl` files
    pub data_dir: PathBuf,
    /// SQLite database to read tables from instead of `data_dir`
    pub database: Option<PathBuf>,
    /// Pretty-print the output
    pub pretty: bool,
    /// Include the resolved syntax tree in the output
    pub show_ast: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            query: String::new(),
            data_dir: PathBuf::from("data"),
            database: None,
            pretty: false,
            show_ast: false,
        }
    }
}

/// Everything a run produces, ready to print
#[derive(Debug)]
pub struct RunOutput {
    /// Debug rendering of the resolved document, when requested
    pub ast: Option<String>,
    /// Values passed to `print(...)`
    pub printed: Vec<crate::Value>,
    /// The result document as JSON
    pub json: String,
}

pub fn execute_run(options: &RunOptions) -> Result<RunOutput, CliError> {
    if options.database.is_none() && !options.data_dir.is_dir() {
        return Err(CliError::MissingDataDir(options.data_dir.clone()));
    }

    let compiled = compile(&options.query)?;
    let ast = options
        .show_ast
        .then(|| format!("{:#?}", compiled.document));

    let results = match &options.database {
        Some(path) => {
            let source = SqliteSource::open(path).map_err(|e| crate::Error::from(ExecError::from(e)))?;
            run_document(&compiled.document, &source)
        }
        None => run_document(&compiled.document, &DirectorySource::new(&options.data_dir)),
    }
    .map_err(crate::Error::from)?;
    let value = document_value(&results);
    let json = if options.pretty {
        to_json_pretty(&value)
    } else {
        to_json(&value)
    };

    Ok(RunOutput {
        ast,
        printed: compiled.printed,
        json,
    })
}
