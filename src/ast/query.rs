use indexmap::{IndexMap, IndexSet};

use crate::ast::Position;
use crate::value::{Range, SetLiteral, Value};

/// A parsed and macro-resolved query document.
///
/// Root blocks are keyed by output key in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub tables: IndexMap<String, TableNode>,
}

/// One query block: a table to read and the fields to take from it.
#[derive(Debug, Clone, PartialEq)]
pub struct TableNode {
    /// Name handed to the table source
    pub table_source: String,
    /// Key the block's result is stored under in its parent
    pub output_key: String,
    /// Empty result drops the parent row (`!`)
    pub strict: bool,
    /// Single visible field collapses rows to bare values (`*`)
    pub pluck: bool,
    /// Fields by output key, in declared order
    pub fields: IndexMap<String, FieldSpec>,
    /// Output keys kept out of the result: `~` fields, and filters without `:= key`
    pub internal_keys: IndexSet<String>,
    /// Where the block's table reference was written
    pub position: Position,
}

impl TableNode {
    pub fn new(table_source: impl Into<String>, position: Position) -> Self {
        let table_source = table_source.into();
        TableNode {
            output_key: table_source.clone(),
            table_source,
            strict: false,
            pluck: false,
            fields: IndexMap::new(),
            internal_keys: IndexSet::new(),
            position,
        }
    }

    pub fn is_internal(&self, key: &str) -> bool {
        self.internal_keys.contains(key)
    }

    /// Output keys that survive into the result, in declared order
    pub fn visible_keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys().filter(|k| !self.is_internal(k))
    }

    /// Direct nested blocks, in declared order
    pub fn children(&self) -> impl Iterator<Item = (&String, &TableNode)> {
        self.fields.iter().filter_map(|(key, spec)| match spec {
            FieldSpec::NestedTable(node) => Some((key, node)),
            _ => None,
        })
    }

    /// Every table name this block and its descendants read from
    pub fn table_sources(&self) -> Vec<&str> {
        let mut names = vec![self.table_source.as_str()];
        for (_, child) in self.children() {
            names.extend(child.table_sources());
        }
        names
    }
}

/// What a field asks of the current row.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSpec {
    /// `name` - emit the column as is
    ColumnRef(String),
    /// `title := name` - emit the column under another key
    Alias { column: String, renamed_to: String },
    /// `budget : [50, 100)` - keep rows whose column passes the filter
    ValueFilter { column: String, filter: Filter },
    /// `id := d_id` - emit under `bound_name` and bind it for descendants
    VariableBind { column: String, bound_name: String },
    /// `director_id = d_id` - keep rows whose column equals an ancestor binding
    ContextEquals { column: String, bound_name: String },
    /// A nested block, evaluated once per row
    NestedTable(TableNode),
}

impl FieldSpec {
    /// The source column this field reads, if it reads one
    pub fn column(&self) -> Option<&str> {
        match self {
            FieldSpec::ColumnRef(column)
            | FieldSpec::Alias { column, .. }
            | FieldSpec::ValueFilter { column, .. }
            | FieldSpec::VariableBind { column, .. }
            | FieldSpec::ContextEquals { column, .. } => Some(column),
            FieldSpec::NestedTable(_) => None,
        }
    }
}

/// A literal predicate resolved at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Equality with a scalar (`country : "India"`)
    Literal(Value),
    /// Interval membership (`budget : [50, 100)`)
    Range(Range),
    /// Set membership (`country : {"India", "USA"}`)
    Set(SetLiteral),
}

impl Filter {
    pub fn matches(&self, cell: &Value) -> bool {
        match self {
            Filter::Literal(expected) => cell.loose_eq(expected),
            Filter::Range(range) => cell.as_number().is_some_and(|n| range.contains(n)),
            Filter::Set(set) => set.contains(cell),
        }
    }
}
