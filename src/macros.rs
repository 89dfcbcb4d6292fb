//! Global block resolution.
//!
//! ```text
//! global {
//!     $low := 50,
//!     $high := $low * 2,
//!     $budget := [$low, $high),
//!     print($budget),
//! }
//! ```
//!
//! Resolution runs in three phases. Declarations are first collected as raw
//! source text. References are then expanded textually, each `$name`
//! becoming the parenthesized text of `name`, until nothing changes. Finally
//! every expanded text is evaluated in declaration order.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::{Captures, Regex};
use thiserror::Error;

use crate::{
    ast::{Position, Token, TokenKind},
    evaluator::{EvalError, Evaluator},
    parser::SyntaxError,
    value::Value,
};

/// Quoted strings are matched first so references inside them stay put.
static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|\$([_\p{Alphabetic}]\w*)"#)
        .expect("macro reference pattern is valid")
});

/// Upper bound on an expanded macro text, in bytes.
pub const MAX_EXPANSION: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MacroError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("Undefined macro ${name} referenced by {referenced_by}")]
    Unbound { name: String, referenced_by: String },

    #[error("Cyclic macro definitions: {}", sigiled(.names))]
    Cyclic { names: Vec<String> },

    #[error("Expansion of {name} exceeds the 1 MiB limit")]
    ExpansionTooLarge { name: String },

    #[error("Failed to evaluate {name}: {source}")]
    Eval {
        name: String,
        #[source]
        source: EvalError,
    },
}

/// Resolved macro values, immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacroTable {
    values: IndexMap<String, Value>,
}

impl MacroTable {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Macros in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

impl FromIterator<(String, Value)> for MacroTable {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        MacroTable {
            values: iter.into_iter().collect(),
        }
    }
}

/// One entry of the global block, still unevaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    /// `$name := <raw>`
    Macro {
        name: String,
        raw: String,
        position: Position,
    },
    /// `print(...)`; `raw` holds the whole call
    Print { raw: String, position: Position },
}

impl Declaration {
    pub fn raw(&self) -> &str {
        match self {
            Declaration::Macro { raw, .. } | Declaration::Print { raw, .. } => raw,
        }
    }

    fn raw_mut(&mut self) -> &mut String {
        match self {
            Declaration::Macro { raw, .. } | Declaration::Print { raw, .. } => raw,
        }
    }

    fn label(&self) -> String {
        match self {
            Declaration::Macro { name, .. } => format!("${}", name),
            Declaration::Print { position, .. } => format!("print at {}", position),
        }
    }
}

/// Output of a successful resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub table: MacroTable,
    /// Values passed to `print(...)`, in evaluation order
    pub printed: Vec<Value>,
}

pub struct MacroResolver<'a> {
    source: &'a str,
}

impl<'a> MacroResolver<'a> {
    /// `source` is the full document; token offsets index into it.
    pub fn new(source: &'a str) -> Self {
        MacroResolver { source }
    }

    /// Runs all three phases over the tokens between the global block's braces.
    pub fn resolve(&self, body: &[Token]) -> Result<Resolution, MacroError> {
        let mut declarations = self.collect(body)?;
        Self::substitute(&mut declarations)?;
        Self::evaluate(&declarations)
    }

    /// Phase 1: split the block into declarations at its own commas and keep
    /// each right-hand side as source text.
    pub fn collect(&self, body: &[Token]) -> Result<Vec<Declaration>, MacroError> {
        let body: Vec<&Token> = body.iter().filter(|t| t.kind != TokenKind::Eof).collect();
        let Some(first) = body.first() else {
            return Ok(Vec::new());
        };
        let depth = first.depth;

        let mut declarations: Vec<Declaration> = Vec::new();
        for entry in body.split(|t| t.depth == depth && t.kind == TokenKind::Comma) {
            let Some(head) = entry.first() else {
                continue;
            };
            let declaration = match (&head.kind, entry.get(1).map(|t| &t.kind)) {
                (TokenKind::Variable(name), Some(TokenKind::ColonEqual)) => {
                    let rhs = &entry[2..];
                    if rhs.is_empty() {
                        return Err(syntax(
                            format!("Missing value for ${}", name),
                            entry[1].position,
                        ));
                    }
                    if declarations
                        .iter()
                        .any(|d| matches!(d, Declaration::Macro { name: n, .. } if n == name))
                    {
                        return Err(syntax(format!("Macro ${} is declared twice", name), head.position));
                    }
                    Declaration::Macro {
                        name: name.clone(),
                        raw: self.text(rhs),
                        position: head.position,
                    }
                }
                (TokenKind::Identifier(word), Some(TokenKind::LParen)) if word == "print" => {
                    Declaration::Print {
                        raw: self.text(entry),
                        position: head.position,
                    }
                }
                (kind, _) => {
                    return Err(syntax(
                        format!("Expected `$name := value` or `print(...)` in global block, found {}", kind),
                        head.position,
                    ));
                }
            };
            declarations.push(declaration);
        }
        Ok(declarations)
    }

    fn text(&self, tokens: &[&Token]) -> String {
        match (tokens.first(), tokens.last()) {
            (Some(first), Some(last)) => self
                .source
                .get(first.position.offset..last.end())
                .unwrap_or_default()
                .to_string(),
            _ => String::new(),
        }
    }

    /// Phase 2: expand references until a fixed point. A chain of `n`
    /// macros settles within `n` passes; anything still changing after that
    /// is a cycle.
    pub fn substitute(declarations: &mut [Declaration]) -> Result<(), MacroError> {
        let max_passes = declarations.len() + 1;
        for _ in 0..max_passes {
            let snapshot: IndexMap<String, String> = declarations
                .iter()
                .filter_map(|d| match d {
                    Declaration::Macro { name, raw, .. } => Some((name.clone(), raw.clone())),
                    Declaration::Print { .. } => None,
                })
                .collect();

            let mut changed = false;
            for declaration in declarations.iter_mut() {
                let own = match declaration {
                    Declaration::Macro { name, .. } => Some(name.clone()),
                    Declaration::Print { .. } => None,
                };
                let label = declaration.label();
                let mut unbound: Option<String> = None;

                let expanded = REFERENCE.replace_all(declaration.raw(), |caps: &Captures| {
                    let whole = caps[0].to_string();
                    let Some(name) = caps.get(1).map(|m| m.as_str()) else {
                        return whole;
                    };
                    if own.as_deref() == Some(name) {
                        return whole;
                    }
                    match snapshot.get(name) {
                        Some(text) => format!("({})", text),
                        None => {
                            unbound.get_or_insert_with(|| name.to_string());
                            whole
                        }
                    }
                });

                if let Some(name) = unbound {
                    return Err(MacroError::Unbound {
                        name,
                        referenced_by: label,
                    });
                }
                if expanded.len() > MAX_EXPANSION {
                    return Err(MacroError::ExpansionTooLarge { name: label });
                }
                if expanded != declaration.raw() {
                    let expanded = expanded.into_owned();
                    *declaration.raw_mut() = expanded;
                    changed = true;
                }
            }

            if !changed {
                break;
            }
        }

        // Self references survive a fixed point, longer cycles outlast the
        // pass budget; either way a reference is left behind.
        let cyclic: Vec<String> = declarations
            .iter()
            .filter(|d| has_reference(d.raw()))
            .map(|d| match d {
                Declaration::Macro { name, .. } => name.clone(),
                Declaration::Print { .. } => "print".to_string(),
            })
            .collect();
        if !cyclic.is_empty() {
            return Err(MacroError::Cyclic { names: cyclic });
        }
        Ok(())
    }

    /// Phase 3: evaluate the expanded texts in declaration order.
    pub fn evaluate(declarations: &[Declaration]) -> Result<Resolution, MacroError> {
        let empty = MacroTable::default();
        let mut evaluator = Evaluator::new(&empty);
        let mut values = IndexMap::new();

        for declaration in declarations {
            let value = evaluator
                .eval_str(declaration.raw())
                .map_err(|source| MacroError::Eval {
                    name: declaration.label(),
                    source,
                })?;
            if let Declaration::Macro { name, .. } = declaration {
                tracing::debug!(name = %name, value = %value, "resolved macro");
                values.insert(name.clone(), value);
            }
        }

        Ok(Resolution {
            table: MacroTable { values },
            printed: evaluator.take_printed(),
        })
    }
}

fn has_reference(text: &str) -> bool {
    REFERENCE
        .captures_iter(text)
        .any(|caps| caps.get(1).is_some())
}

fn sigiled(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("${}", n))
        .collect::<Vec<_>>()
        .join(", ")
}

fn syntax(message: String, position: Position) -> MacroError {
    MacroError::Syntax(SyntaxError { message, position })
}
