//! GQL: a compact, GraphQL-flavored query language over tabular data.
//!
//! ```text
//! global {
//!     $budget := [50, 100),
//! }
//!
//! <directors> {
//!     id := d_id,
//!     name,
//!     <movies>* {
//!         director_id = d_id,
//!         ~budget : $budget,
//!         title,
//!     } := titles
//! }
//! ```
//!
//! Text flows through the [`Lexer`], the [`MacroResolver`] (global block
//! only), the [`Parser`] and finally the [`Executor`], which reads rows from
//! a [`TableSource`].

pub mod ast;
pub mod convert;
pub mod evaluator;
pub mod executor;
pub mod lexer;
pub mod macros;
pub mod output;
pub mod parser;
pub mod source;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

use indexmap::IndexMap;
use thiserror::Error;

pub use ast::{Document, Expr, FieldSpec, Filter, TableNode, Token, TokenKind};
pub use evaluator::{EvalError, Evaluator};
pub use executor::{ExecError, ExecutionContext, Executor, ResultValue, run_document, run_query};
pub use lexer::{LexError, Lexer, Position};
pub use macros::{MacroError, MacroResolver, MacroTable, Resolution};
pub use output::{to_json, to_json_pretty};
pub use parser::{ParseError, Parser, SyntaxError};
pub use source::{DirectorySource, MemorySource, Row, SourceError, TableSource};
#[cfg(feature = "sqlite")]
pub use source::SqliteSource;
pub use value::{Range, SetLiteral, Value};

/// Any failure while compiling or running a document.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Macro(#[from] MacroError),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

impl From<SyntaxError> for Error {
    fn from(e: SyntaxError) -> Self {
        Error::Parse(ParseError::Syntax(e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A parsed document together with its resolved globals.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub document: Document,
    pub macros: MacroTable,
    /// Values passed to `print(...)` in the global block
    pub printed: Vec<Value>,
}

/// Lexes, resolves the global block and parses `source`.
pub fn compile(source: &str) -> Result<Compiled> {
    let tokens = Lexer::new(source).tokenize()?;
    let resolution = match parser::global_block(&tokens)? {
        Some(body) => MacroResolver::new(source).resolve(body)?,
        None => Resolution::default(),
    };
    let document = Parser::new(&tokens, &resolution.table).parse_document()?;
    tracing::debug!(
        macros = resolution.table.len(),
        blocks = document.tables.len(),
        "compiled document"
    );
    Ok(Compiled {
        document,
        macros: resolution.table,
        printed: resolution.printed,
    })
}

/// Compiles and runs `source` against `tables`.
///
/// # Examples
///
/// ```
/// use gql_lang::{MemorySource, Value, output::{document_value, to_json}};
///
/// let tables = MemorySource::new().with_table(
///     "movies",
///     vec![
///         vec![("title", Value::from("Movie A")), ("budget", Value::Integer(60))],
///         vec![("title", Value::from("Movie B")), ("budget", Value::Integer(120))],
///     ],
/// );
/// let results = gql_lang::run("<movies>* { ~budget : [50, 100), title }", &tables).unwrap();
/// assert_eq!(to_json(&document_value(&results)), r#"{"movies":["Movie A"]}"#);
/// ```
pub fn run<S: TableSource + ?Sized>(source: &str, tables: &S) -> Result<IndexMap<String, ResultValue>> {
    let compiled = compile(source)?;
    Ok(run_document(&compiled.document, tables)?)
}
