//! Recursive join-and-filter execution of a parsed document.
//!
//! Each block reads its table once per parent row, keeps the rows that pass
//! its filters, binds variables for its nested blocks and assembles the
//! visible fields in declared order.

use std::{collections::HashMap, rc::Rc};

use indexmap::IndexMap;
use thiserror::Error;

use crate::{
    ast::{Document, FieldSpec, TableNode},
    convert::value_to_json,
    source::{Row, SourceError, TableSource},
    value::Value,
};

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Table '{table}' not found")]
    TableNotFound { table: String },

    #[error("Column '{column}' not found in table '{table}'")]
    ColumnNotFound { column: String, table: String },

    #[error("Variable '{name}' is not bound for table '{table}'")]
    UnboundVariable { name: String, table: String },

    #[error(transparent)]
    Source(SourceError),
}

impl From<SourceError> for ExecError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::NotFound { table } => ExecError::TableNotFound { table },
            other => ExecError::Source(other),
        }
    }
}

/// Variables bound by ancestor rows.
///
/// Extending returns a new context, so siblings never see each other's
/// bindings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionContext {
    bindings: IndexMap<String, Value>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn extended(&self, bindings: impl IntoIterator<Item = (String, Value)>) -> Self {
        let mut next = self.clone();
        next.bindings.extend(bindings);
        next
    }
}

/// Result of one block.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultValue {
    /// Assembled objects
    Rows(Vec<Row>),
    /// Plucked values
    Values(Vec<Value>),
    /// A strict root block that matched nothing
    Absent,
}

impl ResultValue {
    pub fn len(&self) -> usize {
        match self {
            ResultValue::Rows(rows) => rows.len(),
            ResultValue::Values(values) => values.len(),
            ResultValue::Absent => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, ResultValue::Absent)
    }

    /// `Absent` becomes `Null`; the rest become arrays.
    pub fn into_value(self) -> Value {
        match self {
            ResultValue::Rows(rows) => Value::Array(rows.into_iter().map(Value::Object).collect()),
            ResultValue::Values(values) => Value::Array(values),
            ResultValue::Absent => Value::Null,
        }
    }

    /// Same shape as [`ResultValue::into_value`], as `serde_json` data.
    pub fn to_json_value(&self) -> serde_json::Value {
        value_to_json(&self.clone().into_value())
    }
}

pub struct Executor<'s, S: TableSource + ?Sized> {
    source: &'s S,
    // Tables are read once per executor
    cache: HashMap<String, Rc<Vec<Row>>>,
}

impl<'s, S: TableSource + ?Sized> Executor<'s, S> {
    pub fn new(source: &'s S) -> Self {
        Executor {
            source,
            cache: HashMap::new(),
        }
    }

    /// Fails on the first table in `node`'s tree the source cannot supply.
    pub fn check_tables(&self, node: &TableNode) -> Result<(), ExecError> {
        match node
            .table_sources()
            .into_iter()
            .find(|table| !self.source.has_table(table))
        {
            Some(table) => Err(ExecError::TableNotFound {
                table: table.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Runs one root block under `output_key`.
    pub fn execute(
        &mut self,
        output_key: &str,
        node: &TableNode,
        context: &ExecutionContext,
    ) -> Result<ResultValue, ExecError> {
        self.check_tables(node)?;
        let rows = self.evaluate(node, context)?;
        let result = if node.strict && rows.is_empty() {
            ResultValue::Absent
        } else {
            shape(node, rows)
        };
        tracing::info!(key = output_key, table = %node.table_source, rows = result.len(), "executed root block");
        Ok(result)
    }

    fn rows(&mut self, table: &str) -> Result<Rc<Vec<Row>>, ExecError> {
        if let Some(rows) = self.cache.get(table) {
            return Ok(Rc::clone(rows));
        }
        let rows = Rc::new(self.source.rows_for(table)?);
        self.cache.insert(table.to_string(), Rc::clone(&rows));
        Ok(rows)
    }

    /// Visible rows of `node` under `context`, before pluck.
    fn evaluate(&mut self, node: &TableNode, context: &ExecutionContext) -> Result<Vec<Row>, ExecError> {
        // Resolve context lookups up front so an unbound name fails even on an empty table
        let mut expected = Vec::new();
        for spec in node.fields.values() {
            if let FieldSpec::ContextEquals { column, bound_name } = spec {
                let value = context.get(bound_name).ok_or_else(|| ExecError::UnboundVariable {
                    name: bound_name.clone(),
                    table: node.table_source.clone(),
                })?;
                expected.push((column.as_str(), value));
            }
        }

        let rows = self.rows(&node.table_source)?;
        let mut out = Vec::new();

        'rows: for row in rows.iter() {
            for spec in node.fields.values() {
                if let FieldSpec::ValueFilter { column, filter } = spec
                    && !filter.matches(cell(node, row, column)?)
                {
                    continue 'rows;
                }
            }
            for (column, value) in &expected {
                if !cell(node, row, column)?.loose_eq(value) {
                    continue 'rows;
                }
            }

            let mut bindings = Vec::new();
            for spec in node.fields.values() {
                if let FieldSpec::VariableBind { column, bound_name } = spec {
                    bindings.push((bound_name.clone(), cell(node, row, column)?.clone()));
                }
            }
            let row_context = if bindings.is_empty() {
                context.clone()
            } else {
                context.extended(bindings)
            };

            let mut object = Row::new();
            for (key, spec) in &node.fields {
                let value = match spec {
                    FieldSpec::NestedTable(child) => {
                        let child_rows = self.evaluate(child, &row_context)?;
                        if child.strict && child_rows.is_empty() {
                            continue 'rows;
                        }
                        shape(child, child_rows).into_value()
                    }
                    FieldSpec::ColumnRef(column)
                    | FieldSpec::Alias { column, .. }
                    | FieldSpec::ValueFilter { column, .. }
                    | FieldSpec::VariableBind { column, .. }
                    | FieldSpec::ContextEquals { column, .. } => cell(node, row, column)?.clone(),
                };
                if !node.is_internal(key) {
                    object.insert(key.clone(), value);
                }
            }
            out.push(object);
        }

        tracing::debug!(
            table = %node.table_source,
            key = %node.output_key,
            fetched = rows.len(),
            kept = out.len(),
            "executed table node"
        );
        Ok(out)
    }
}

fn cell<'r>(node: &TableNode, row: &'r Row, column: &str) -> Result<&'r Value, ExecError> {
    row.get(column).ok_or_else(|| ExecError::ColumnNotFound {
        column: column.to_string(),
        table: node.table_source.clone(),
    })
}

/// Applies pluck to assembled rows.
fn shape(node: &TableNode, rows: Vec<Row>) -> ResultValue {
    if !node.pluck {
        return ResultValue::Rows(rows);
    }
    let visible = node.visible_keys().count();
    if visible != 1 {
        tracing::warn!(
            table = %node.table_source,
            key = %node.output_key,
            visible,
            "pluck needs exactly one visible field; keeping rows as objects"
        );
        return ResultValue::Rows(rows);
    }
    ResultValue::Values(
        rows.into_iter()
            .filter_map(|row| row.into_iter().next().map(|(_, v)| v))
            .collect(),
    )
}

/// Runs a single root block with an empty context.
pub fn run_query<S: TableSource + ?Sized>(
    output_key: &str,
    node: &TableNode,
    source: &S,
) -> Result<ResultValue, ExecError> {
    Executor::new(source).execute(output_key, node, &ExecutionContext::new())
}

/// Runs every root block in declaration order.
///
/// All tables of the document are checked before any row is read.
pub fn run_document<S: TableSource + ?Sized>(
    document: &Document,
    source: &S,
) -> Result<IndexMap<String, ResultValue>, ExecError> {
    let mut executor = Executor::new(source);
    for node in document.tables.values() {
        executor.check_tables(node)?;
    }
    let root = ExecutionContext::new();
    let mut results = IndexMap::new();
    for (key, node) in &document.tables {
        let result = executor.execute(key, node, &root)?;
        results.insert(key.clone(), result);
    }
    Ok(results)
}
