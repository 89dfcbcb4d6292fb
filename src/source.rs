//! Table sources: where the executor gets its rows.
//!
//! The executor only sees the [`TableSource`] trait. [`MemorySource`] keeps
//! tables in memory; [`DirectorySource`] reads `<dir>/<table>.csv`,
//! `<table>.json` or `<table>.jsonl`. With the `sqlite` feature,
//! `SqliteSource` reads tables from a SQLite database.

use std::{
    fs, io,
    path::PathBuf,
    sync::LazyLock,
};

use indexmap::IndexMap;
use regex::Regex;
use thiserror::Error;

use crate::{convert::json_to_scalar, value::Value};

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSource;

/// One row: column name to scalar, in header order.
pub type Row = IndexMap<String, Value>;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Table '{table}' not found")]
    NotFound { table: String },

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed data in {}: {message}", .path.display())]
    Malformed { path: PathBuf, message: String },

    #[cfg(feature = "sqlite")]
    #[error("SQLite error in {}: {source}", .path.display())]
    Sqlite {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
}

/// Supplies rows for named tables.
///
/// Fetching is expected to be idempotent: the same table yields the same
/// rows for the duration of a query.
pub trait TableSource {
    fn has_table(&self, table: &str) -> bool;

    fn rows_for(&self, table: &str) -> Result<Vec<Row>, SourceError>;
}

impl<T: TableSource + ?Sized> TableSource for &T {
    fn has_table(&self, table: &str) -> bool {
        (**self).has_table(table)
    }

    fn rows_for(&self, table: &str) -> Result<Vec<Row>, SourceError> {
        (**self).rows_for(table)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: IndexMap<String, Vec<Row>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: impl Into<String>, rows: Vec<Row>) {
        self.tables.insert(table.into(), rows);
    }

    /// Builder form of [`MemorySource::insert`].
    ///
    /// # Examples
    ///
    /// ```
    /// use gql_lang::source::{MemorySource, TableSource};
    /// use gql_lang::Value;
    ///
    /// let source = MemorySource::new().with_table(
    ///     "directors",
    ///     vec![vec![("id", Value::String("d1".into()))]],
    /// );
    /// assert!(source.has_table("directors"));
    /// ```
    pub fn with_table<K: Into<String>>(mut self, table: impl Into<String>, rows: Vec<Vec<(K, Value)>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(|(k, v)| (k.into(), v)).collect())
            .collect();
        self.insert(table, rows);
        self
    }
}

impl TableSource for MemorySource {
    fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    fn rows_for(&self, table: &str) -> Result<Vec<Row>, SourceError> {
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| SourceError::NotFound {
                table: table.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Csv,
    Json,
    JsonLines,
}

impl Format {
    /// In order of preference
    const ALL: [Format; 3] = [Format::Csv, Format::Json, Format::JsonLines];

    fn extension(self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Json => "json",
            Format::JsonLines => "jsonl",
        }
    }
}

/// Reads tables from files in one directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectorySource { root: root.into() }
    }

    fn locate(&self, table: &str) -> Option<(PathBuf, Format)> {
        // Table names come from the query; keep them inside the directory
        if table.is_empty() || table.contains(['/', '\\']) || table.starts_with('.') {
            return None;
        }
        Format::ALL.into_iter().find_map(|format| {
            let path = self.root.join(format!("{}.{}", table, format.extension()));
            path.is_file().then_some((path, format))
        })
    }
}

impl TableSource for DirectorySource {
    fn has_table(&self, table: &str) -> bool {
        self.locate(table).is_some()
    }

    fn rows_for(&self, table: &str) -> Result<Vec<Row>, SourceError> {
        let (path, format) = self.locate(table).ok_or_else(|| SourceError::NotFound {
            table: table.to_string(),
        })?;
        let text = fs::read_to_string(&path).map_err(|source| SourceError::Io {
            path: path.clone(),
            source,
        })?;
        let rows = match format {
            Format::Csv => parse_csv(&text),
            Format::Json => parse_json(&text),
            Format::JsonLines => parse_json_lines(&text),
        }
        .map_err(|message| SourceError::Malformed {
            path: path.clone(),
            message,
        })?;
        tracing::debug!(table, path = %path.display(), rows = rows.len(), "loaded table");
        Ok(rows)
    }
}

/// One CSV field at the start of the input: quoted with `""` escapes
/// (surrounding blanks allowed), or anything up to the next comma.
static CSV_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?:[ \t]*"((?:[^"]|"")*)"[ \t]*|([^,"]*))"#).expect("CSV field pattern is valid")
});

fn split_csv_line(line: &str, line_no: usize) -> Result<Vec<Value>, String> {
    let stray_quote = |at: usize| format!("line {}: stray quote near column {}", line_no, at + 1);

    let mut cells = Vec::new();
    let mut at = 0;
    loop {
        let caps = CSV_FIELD.captures(&line[at..]).ok_or_else(|| stray_quote(at))?;
        let cell = match (caps.get(1), caps.get(2)) {
            (Some(quoted), _) => Value::String(quoted.as_str().replace("\"\"", "\"")),
            (None, Some(bare)) => infer_cell(bare.as_str()),
            (None, None) => Value::Null,
        };
        cells.push(cell);
        at += caps.get(0).map_or(0, |whole| whole.end());

        match line[at..].chars().next() {
            None => return Ok(cells),
            Some(',') => at += 1,
            Some(_) => return Err(stray_quote(at)),
        }
    }
}

/// Integer, then float, then string; an empty cell is null. Unquoted cells
/// are trimmed.
fn infer_cell(raw: &str) -> Value {
    let text = raw.trim();
    if text.is_empty() {
        return Value::Null;
    }
    if let Ok(n) = text.parse::<i64>() {
        return Value::Integer(n);
    }
    // `inf` and `nan` parse as floats but are text here
    if text.bytes().any(|b| b.is_ascii_digit())
        && let Ok(n) = text.parse::<f64>()
    {
        return Value::Float(n);
    }
    Value::String(text.to_string())
}

pub(crate) fn parse_csv(text: &str) -> Result<Vec<Row>, String> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.trim().is_empty());

    let Some((header_no, header_line)) = lines.next() else {
        return Ok(Vec::new());
    };
    let header: Vec<String> = split_csv_line(header_line, header_no)?
        .into_iter()
        .map(|cell| match cell {
            Value::String(s) => s.trim().to_string(),
            other => other.as_string(),
        })
        .collect();

    let mut rows = Vec::new();
    for (line_no, line) in lines {
        let cells = split_csv_line(line, line_no)?;
        if cells.len() != header.len() {
            return Err(format!(
                "line {}: expected {} fields, found {}",
                line_no,
                header.len(),
                cells.len()
            ));
        }
        rows.push(header.iter().cloned().zip(cells).collect());
    }
    Ok(rows)
}

fn object_to_row(value: serde_json::Value, what: &str) -> Result<Row, String> {
    let serde_json::Value::Object(object) = value else {
        return Err(format!("{} must be an object", what));
    };
    object
        .into_iter()
        .map(|(column, cell)| {
            json_to_scalar(cell)
                .map(|v| (column.clone(), v))
                .ok_or_else(|| format!("{}: column '{}' is not a scalar", what, column))
        })
        .collect()
}

fn parse_json(text: &str) -> Result<Vec<Row>, String> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    let serde_json::Value::Array(items) = value else {
        return Err("expected an array of objects".to_string());
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| object_to_row(item, &format!("element {}", i)))
        .collect()
}

fn parse_json_lines(text: &str) -> Result<Vec<Row>, String> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            let value: serde_json::Value =
                serde_json::from_str(line).map_err(|e| format!("line {}: {}", i + 1, e))?;
            object_to_row(value, &format!("line {}", i + 1))
        })
        .collect()
}
