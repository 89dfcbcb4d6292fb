use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

use crate::{
    ast::{Document, FieldSpec, Filter, Position, TableNode, Token, TokenKind},
    evaluator::{EvalError, Evaluator},
    macros::MacroTable,
    value::Value,
};

/// Keyword that opens the macro declaration block.
pub const GLOBAL_KEYWORD: &str = "global";

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Syntax error at {position}: {message}")]
pub struct SyntaxError {
    pub message: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// A filter value failed to evaluate; unsupported constructs land here
    #[error("Invalid filter value for '{column}': {source}")]
    Filter {
        column: String,
        #[source]
        source: EvalError,
    },
}

/// Index of the closer that matches the opener at `open`.
fn matching_close(tokens: &[Token], open: usize) -> Result<usize, SyntaxError> {
    let depth = tokens[open].depth;
    tokens[open + 1..]
        .iter()
        .position(|t| t.kind.closes() && t.depth == depth)
        .map(|i| open + 1 + i)
        .ok_or_else(|| SyntaxError {
            message: format!("Unclosed {}", tokens[open].kind),
            position: tokens[open].position,
        })
}

/// Locates the body of the `global { ... }` block, if the document has one.
///
/// A second global block is an error.
pub fn global_block(tokens: &[Token]) -> Result<Option<&[Token]>, SyntaxError> {
    let mut found: Option<&[Token]> = None;
    let mut i = 0;
    while i + 1 < tokens.len() {
        let is_global = tokens[i].depth == 0
            && matches!(&tokens[i].kind, TokenKind::Identifier(w) if w == GLOBAL_KEYWORD)
            && tokens[i + 1].kind == TokenKind::LBrace;
        if !is_global {
            i += 1;
            continue;
        }
        if found.is_some() {
            return Err(SyntaxError {
                message: "Only one global block is allowed".to_string(),
                position: tokens[i].position,
            });
        }
        let close = matching_close(tokens, i + 1)?;
        if tokens[close].kind != TokenKind::RBrace {
            return Err(SyntaxError {
                message: format!("Expected '}}' to close the global block, found {}", tokens[close].kind),
                position: tokens[close].position,
            });
        }
        found = Some(&tokens[i + 2..close]);
        i = close + 1;
    }
    Ok(found)
}

/// Output key of a field before duplicate table names are numbered.
enum PendingKey {
    Fixed(String),
    /// Unaliased nested block, keyed by its table name
    Table(String),
}

struct PendingField {
    key: PendingKey,
    spec: FieldSpec,
    internal: bool,
    position: Position,
}

pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    macros: &'a MacroTable,
}

impl<'a> Parser<'a> {
    /// `tokens` is the lexer output for the whole document, `macros` the
    /// resolved global block.
    pub fn new(tokens: &'a [Token], macros: &'a MacroTable) -> Self {
        Parser {
            tokens,
            pos: 0,
            macros,
        }
    }

    fn current(&self) -> &'a Token {
        // The lexer always terminates with Eof; never step past it
        let index = self.pos.min(self.tokens.len().saturating_sub(1));
        &self.tokens[index]
    }

    fn peek(&self, offset: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.current().is(kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            message: message.into(),
            position: self.current().position,
        }
    }

    fn expect(&mut self, expected: TokenKind) -> Result<(), SyntaxError> {
        if !self.check(&expected) {
            return Err(self.error(format!(
                "Expected {}, got {}",
                expected,
                self.current().kind
            )));
        }
        self.advance();
        Ok(())
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String, SyntaxError> {
        match &self.current().kind {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name.clone())
            }
            other => Err(self.error(format!("Expected {} after ':=', got {}", what, other))),
        }
    }

    /// Parses every root block. Root blocks must use `<table>` references.
    pub fn parse_document(&mut self) -> Result<Document, ParseError> {
        if self.tokens.is_empty() {
            return Ok(Document::default());
        }

        let mut pending = Vec::new();
        loop {
            let token = self.current();
            match &token.kind {
                TokenKind::Eof => break,
                TokenKind::Identifier(word)
                    if word == GLOBAL_KEYWORD
                        && self.peek(1).is_some_and(|t| t.kind == TokenKind::LBrace) =>
                {
                    // Already resolved by the macro resolver
                    let close = matching_close(self.tokens, self.pos + 1)?;
                    self.pos = close + 1;
                }
                TokenKind::Exclamation | TokenKind::TableRef(_) => {
                    let position = token.position;
                    let (node, alias) = self.parse_table_block(true)?;
                    let key = match alias {
                        Some(alias) => PendingKey::Fixed(alias),
                        None => PendingKey::Table(node.table_source.clone()),
                    };
                    pending.push(PendingField {
                        key,
                        spec: FieldSpec::NestedTable(node),
                        internal: false,
                        position,
                    });
                }
                TokenKind::Identifier(name) => {
                    return Err(self
                        .error(format!(
                            "Root blocks need an angle-bracket table reference, write <{}>",
                            name
                        ))
                        .into());
                }
                other => {
                    return Err(self
                        .error(format!("Expected a table block like <name> {{ ... }}, got {}", other))
                        .into());
                }
            }
        }

        let mut tables = IndexMap::new();
        for (key, spec, _) in assign_keys(pending)? {
            if let FieldSpec::NestedTable(mut node) = spec {
                node.output_key = key.clone();
                promote_binds(&mut node);
                tables.insert(key, node);
            }
        }
        Ok(Document { tables })
    }

    /// `[!] <table> [*] { [*] fields } [:= alias]`
    ///
    /// Nested blocks may name their table with a bare identifier.
    fn parse_table_block(&mut self, root: bool) -> Result<(TableNode, Option<String>), ParseError> {
        let strict = self.eat(&TokenKind::Exclamation);

        let token = self.current();
        let table = match &token.kind {
            TokenKind::TableRef(name) => name.clone(),
            TokenKind::Identifier(name) if !root => name.clone(),
            other => {
                return Err(self
                    .error(format!("Expected a table reference, got {}", other))
                    .into());
            }
        };
        self.advance();

        let mut node = TableNode::new(table, token.position);
        node.strict = strict;
        node.pluck = self.eat(&TokenKind::Star);
        self.expect(TokenKind::LBrace)?;
        if self.eat(&TokenKind::Star) {
            node.pluck = true;
        }

        let fields = self.parse_field_list()?;
        self.expect(TokenKind::RBrace)?;

        for (key, mut spec, internal) in assign_keys(fields)? {
            if let FieldSpec::NestedTable(child) = &mut spec {
                child.output_key = key.clone();
            }
            if internal {
                node.internal_keys.insert(key.clone());
            }
            node.fields.insert(key, spec);
        }

        let alias = if self.eat(&TokenKind::ColonEqual) {
            Some(self.expect_identifier("a block alias")?)
        } else {
            None
        };
        Ok((node, alias))
    }

    fn parse_field_list(&mut self) -> Result<Vec<PendingField>, ParseError> {
        let mut fields = Vec::new();
        loop {
            match &self.current().kind {
                TokenKind::RBrace => return Ok(fields),
                TokenKind::Eof => return Err(self.error("Unexpected end of input, expected '}'").into()),
                _ => {}
            }
            fields.push(self.parse_field()?);
            // Commas between fields are optional
            self.eat(&TokenKind::Comma);
        }
    }

    fn parse_field(&mut self) -> Result<PendingField, ParseError> {
        let internal = self.eat(&TokenKind::Tilde);
        let token = self.current();
        let position = token.position;

        let nested = match (&token.kind, self.peek(1).map(|t| &t.kind)) {
            (TokenKind::Exclamation | TokenKind::TableRef(_), _) => true,
            (TokenKind::Identifier(_), Some(TokenKind::Star | TokenKind::LBrace)) => true,
            _ => false,
        };
        if nested {
            let (node, alias) = self.parse_table_block(false)?;
            let key = match alias {
                Some(alias) => PendingKey::Fixed(alias),
                None => PendingKey::Table(node.table_source.clone()),
            };
            return Ok(PendingField {
                key,
                spec: FieldSpec::NestedTable(node),
                internal,
                position,
            });
        }

        let TokenKind::Identifier(column) = &token.kind else {
            return Err(self
                .error(format!("Expected a field, got {}", token.kind))
                .into());
        };
        let column = column.clone();
        self.advance();

        // Filters and context matches are predicates; only `:= key` puts them in the output
        let (key, spec, predicate_only) = match &self.current().kind {
            TokenKind::Colon => {
                self.advance();
                let filter = self.parse_filter_value(&column, token.depth)?;
                let (key, renamed) = self.output_key_for(&column)?;
                (key, FieldSpec::ValueFilter { column, filter }, !renamed)
            }
            TokenKind::ColonEqual => {
                self.advance();
                let renamed_to = self.expect_identifier("a new name")?;
                (
                    renamed_to.clone(),
                    FieldSpec::Alias {
                        column,
                        renamed_to,
                    },
                    false,
                )
            }
            TokenKind::Equal => {
                self.advance();
                let bound_name = match &self.current().kind {
                    TokenKind::Identifier(name) => name.clone(),
                    other => {
                        return Err(self
                            .error(format!("Expected a bound name after '=', got {}", other))
                            .into());
                    }
                };
                self.advance();
                let (key, renamed) = self.output_key_for(&column)?;
                (key, FieldSpec::ContextEquals { column, bound_name }, !renamed)
            }
            _ => (column.clone(), FieldSpec::ColumnRef(column), false),
        };

        Ok(PendingField {
            key: PendingKey::Fixed(key),
            spec,
            internal: internal || predicate_only,
            position,
        })
    }

    /// Key for a filter field: `:= key` when present, else the column name.
    /// The flag says whether a key was given.
    fn output_key_for(&mut self, column: &str) -> Result<(String, bool), SyntaxError> {
        if self.eat(&TokenKind::ColonEqual) {
            Ok((self.expect_identifier("an output key")?, true))
        } else {
            Ok((column.to_string(), false))
        }
    }

    /// Consumes the value of `column : value` and resolves it to a filter.
    ///
    /// The value runs until a comma or `:=` at the field's own depth, or the
    /// brace that closes the block.
    fn parse_filter_value(&mut self, column: &str, depth: usize) -> Result<Filter, ParseError> {
        let start = self.pos;
        while let Some(token) = self.tokens.get(self.pos) {
            let at_field_level = token.depth == depth
                && matches!(token.kind, TokenKind::Comma | TokenKind::ColonEqual);
            if token.kind == TokenKind::Eof || token.depth < depth || at_field_level {
                break;
            }
            self.pos += 1;
        }
        let value_tokens = &self.tokens[start..self.pos];
        if value_tokens.is_empty() {
            return Err(self
                .error(format!("Missing filter value for '{}'", column))
                .into());
        }

        for token in value_tokens {
            if let TokenKind::Variable(name) = &token.kind
                && !self.macros.contains(name)
            {
                return Err(SyntaxError {
                    message: format!("Undefined macro ${}", name),
                    position: token.position,
                }
                .into());
            }
        }

        // A lone bare word reads as a string: `name : Alice`
        if let [token] = value_tokens
            && let TokenKind::Identifier(word) = &token.kind
        {
            return Ok(Filter::Literal(Value::String(word.clone())));
        }

        let value = Evaluator::new(self.macros)
            .eval_tokens(value_tokens)
            .map_err(|source| ParseError::Filter {
                column: column.to_string(),
                source,
            })?;
        Ok(match value {
            Value::Range(range) => Filter::Range(range),
            Value::Set(set) => Filter::Set(set),
            scalar => Filter::Literal(scalar),
        })
    }
}

/// Numbers duplicate unaliased tables `name_0`, `name_1`, ... and rejects
/// any other repeated key.
fn assign_keys(fields: Vec<PendingField>) -> Result<Vec<(String, FieldSpec, bool)>, SyntaxError> {
    let mut table_counts: IndexMap<String, usize> = IndexMap::new();
    for field in &fields {
        if let PendingKey::Table(name) = &field.key {
            *table_counts.entry(name.clone()).or_default() += 1;
        }
    }

    let mut seen_per_table: IndexMap<String, usize> = IndexMap::new();
    let mut used: IndexSet<String> = IndexSet::new();
    let mut out = Vec::with_capacity(fields.len());
    for field in fields {
        let key = match field.key {
            PendingKey::Fixed(key) => key,
            PendingKey::Table(name) if table_counts.get(&name).copied().unwrap_or(0) > 1 => {
                let seen = seen_per_table.entry(name.clone()).or_default();
                let key = format!("{}_{}", name, seen);
                *seen += 1;
                key
            }
            PendingKey::Table(name) => name,
        };
        if !used.insert(key.clone()) {
            return Err(SyntaxError {
                message: format!("Duplicate output key '{}'", key),
                position: field.position,
            });
        }
        out.push((key, field.spec, field.internal));
    }
    Ok(out)
}

/// Turns an `Alias` into a `VariableBind` when some descendant matches on
/// its name. Returns the names this subtree reads from its ancestors.
fn promote_binds(node: &mut TableNode) -> IndexSet<String> {
    let mut wanted_below = IndexSet::new();
    for spec in node.fields.values_mut() {
        if let FieldSpec::NestedTable(child) = spec {
            wanted_below.extend(promote_binds(child));
        }
    }

    let mut wanted = wanted_below.clone();
    for spec in node.fields.values_mut() {
        match spec {
            FieldSpec::Alias { column, renamed_to } if wanted_below.contains(renamed_to.as_str()) => {
                *spec = FieldSpec::VariableBind {
                    column: column.clone(),
                    bound_name: renamed_to.clone(),
                };
            }
            FieldSpec::ContextEquals { bound_name, .. } => {
                wanted.insert(bound_name.clone());
            }
            _ => {}
        }
    }
    wanted
}
