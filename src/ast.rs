//! # GQL - Abstract Syntax Tree
//!
//! This module defines the syntax tree for GQL, a GraphQL-flavored query
//! language that joins tabular sources into nested results.
//!
//! ## Architecture Overview
//!
//! The AST module is organized into focused submodules:
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[expressions]** - Nodes of the restricted macro/filter expression grammar
//! - **[operators]** - Binary and unary operators of that grammar
//! - **[query]** - Table nodes and field specifications built by the parser
//!
//! ## Quick Start
//!
//! ```text
//! global {
//!     $low := 50,
//!     $budget := [$low, $low * 2),
//! }
//!
//! <directors> {
//!     id := d_id,
//!     ~country : {"India", "USA"},
//!     !movies *{
//!         name,
//!         ~director_id = d_id,
//!         ~budget : $budget,
//!     } := titles
//! }
//! ```
//!
//! This query returns every Indian or American director that has at least one
//! movie in budget, with the matching movie names flattened into `titles`.
//!
//! ## Core Concepts
//!
//! ### Blocks
//!
//! A block names a table (`<directors>`) and lists fields. Nested blocks are
//! evaluated once per parent row.
//!
//! ### Field Forms
//!
//! - `name` - copy a column
//! - `id := d_id` - copy a column under a new key; descendants can match on `d_id`
//! - `budget : [50, 100)` - keep rows whose column passes a literal, range or set
//! - `director_id = d_id` - keep rows whose column equals a value bound by an ancestor
//!
//! Filter fields are not emitted unless given a key: `budget : [50, 100) := cost`.
//!
//! ### Markers
//!
//! - **Strict** `!` - an empty nested result drops the parent row
//! - **Internal** `~` - the field filters or binds but is not emitted
//! - **Pluck** `*` - a block with one visible field yields bare values
pub mod expressions;
pub mod operators;
pub mod query;
pub mod tokens;

pub use expressions::Expr;
pub use operators::{BinOp, UnaryOp};
pub use query::{Document, FieldSpec, Filter, TableNode};
pub use tokens::{Position, Token, TokenKind};
