//! SQLite-backed tables.

use std::path::{Path, PathBuf};

use rusqlite::{
    Connection, OpenFlags,
    types::{Type, ValueRef},
};

use super::{Row, SourceError, TableSource};
use crate::value::Value;

/// Reads tables (and views) from a SQLite database file.
///
/// Every table is read whole; filtering and joins stay in the executor.
#[derive(Debug)]
pub struct SqliteSource {
    path: PathBuf,
    db: Connection,
}

impl SqliteSource {
    /// Opens an existing database read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let db = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY).map_err(|source| {
            SourceError::Sqlite {
                path: path.clone(),
                source,
            }
        })?;
        Ok(SqliteSource { path, db })
    }

    fn error(&self, source: rusqlite::Error) -> SourceError {
        SourceError::Sqlite {
            path: self.path.clone(),
            source,
        }
    }

    fn lookup(&self, table: &str) -> Result<bool, rusqlite::Error> {
        let mut stmt = self
            .db
            .prepare("SELECT 1 FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1")?;
        stmt.exists(rusqlite::params![table])
    }
}

impl TableSource for SqliteSource {
    fn has_table(&self, table: &str) -> bool {
        match self.lookup(table) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(table, path = %self.path.display(), error = %e, "table lookup failed");
                false
            }
        }
    }

    fn rows_for(&self, table: &str) -> Result<Vec<Row>, SourceError> {
        if !self.lookup(table).map_err(|e| self.error(e))? {
            return Err(SourceError::NotFound {
                table: table.to_string(),
            });
        }

        let sql = format!("SELECT * FROM \"{}\"", table.replace('"', "\"\""));
        let mut stmt = self.db.prepare(&sql).map_err(|e| self.error(e))?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let rows = stmt
            .query_map([], |row| {
                columns
                    .iter()
                    .enumerate()
                    .map(|(i, column)| {
                        let value = match row.get_ref(i)? {
                            ValueRef::Null => Value::Null,
                            ValueRef::Integer(n) => Value::Integer(n),
                            ValueRef::Real(n) => Value::Float(n),
                            ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
                            ValueRef::Blob(_) => {
                                return Err(rusqlite::Error::InvalidColumnType(i, column.clone(), Type::Blob));
                            }
                        };
                        Ok((column.clone(), value))
                    })
                    .collect::<rusqlite::Result<Row>>()
            })
            .map_err(|e| self.error(e))?
            .collect::<rusqlite::Result<Vec<Row>>>()
            .map_err(|e| self.error(e))?;

        tracing::debug!(table, path = %self.path.display(), rows = rows.len(), "loaded table");
        Ok(rows)
    }
}
