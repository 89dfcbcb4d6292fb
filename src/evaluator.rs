use indexmap::IndexMap;
use rust_decimal::{Decimal, prelude::FromPrimitive, prelude::ToPrimitive};
use thiserror::Error;

use crate::{
    ast::{BinOp, Expr, Position, Token, TokenKind, UnaryOp},
    lexer::{LexError, Lexer},
    macros::MacroTable,
    value::{Range, SetLiteral, Value},
};

/// Errors that can occur while parsing or evaluating an expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    Lex(#[from] LexError),

    /// Construct outside the whitelisted grammar. Never downgraded.
    #[error("Unsupported expression at {position}: {construct} is not allowed")]
    Unsupported { construct: String, position: Position },

    /// Structurally broken expression (`1 +`, `[1, 2`)
    #[error("Malformed expression at {position}: {message}")]
    Malformed { message: String, position: Position },

    /// Reference to a name the environment does not hold
    #[error("Undefined macro ${name} at {position}")]
    UnboundMacro { name: String, position: Position },

    /// Type mismatch or invalid operation for the given type
    #[error("Type error: {0}")]
    TypeError(String),

    /// Division by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Integer result does not fit in 64 bits
    #[error("Integer overflow in '{0}'")]
    Overflow(&'static str),
}

// Python keywords that would otherwise read as a variable name. Each of
// them starts a construct the grammar refuses.
const RESERVED: &[&str] = &[
    "and", "as", "assert", "async", "await", "class", "def", "del", "elif", "else", "except",
    "for", "from", "global", "if", "import", "in", "is", "lambda", "nonlocal", "not", "or",
    "pass", "raise", "return", "try", "while", "with", "yield",
];

/// Recursive-descent parser for the expression grammar.
///
/// Works on a token slice so the query parser can hand over the tokens of a
/// filter value without re-lexing. A trailing `Eof` token is optional.
pub struct ExprParser<'a> {
    tokens: &'a [Token],
    pos: usize,
    end: Position,
}

impl<'a> ExprParser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        let end = tokens
            .last()
            .map(|t| Position {
                offset: t.end(),
                line: t.position.line,
                column: t.position.column + t.lexeme.chars().count(),
            })
            .unwrap_or_default();
        ExprParser { tokens, pos: 0, end }
    }

    fn current(&self) -> Option<&'a Token> {
        self.tokens
            .get(self.pos)
            .filter(|t| t.kind != TokenKind::Eof)
    }

    fn peek_kind(&self, offset: usize) -> Option<&'a TokenKind> {
        self.tokens
            .get(self.pos + offset)
            .map(|t| &t.kind)
            .filter(|k| **k != TokenKind::Eof)
    }

    fn position(&self) -> Position {
        self.current().map(|t| t.position).unwrap_or(self.end)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.current().is_some_and(|t| t.is(kind))
    }

    /// Parses the whole slice as one expression.
    pub fn parse(&mut self) -> Result<Expr, EvalError> {
        let expr = self.parse_expression()?;
        if self.current().is_some() {
            return Err(self.unexpected());
        }
        Ok(expr)
    }

    pub fn parse_expression(&mut self) -> Result<Expr, EvalError> {
        self.parse_bit_or()
    }

    /// Classifies whatever sits at the cursor as the most helpful error.
    fn unexpected(&self) -> EvalError {
        let position = self.position();
        let unsupported = |construct: &str| EvalError::Unsupported {
            construct: construct.to_string(),
            position,
        };
        let Some(token) = self.current() else {
            return EvalError::Malformed {
                message: "unexpected end of expression".to_string(),
                position,
            };
        };
        match &token.kind {
            TokenKind::Dot => unsupported("attribute access"),
            TokenKind::EqEq
            | TokenKind::NotEq
            | TokenKind::Lt
            | TokenKind::Gt
            | TokenKind::LtEq
            | TokenKind::GtEq => unsupported(&format!("comparison {}", token.kind)),
            TokenKind::Equal | TokenKind::ColonEqual => unsupported("assignment"),
            TokenKind::Exclamation => unsupported("'!'"),
            TokenKind::Colon => unsupported("dict literal or slice"),
            TokenKind::TableRef(_) => unsupported("table reference"),
            TokenKind::Identifier(word) if word == "for" => unsupported("comprehension"),
            TokenKind::Identifier(word) if RESERVED.contains(&word.as_str()) => {
                unsupported(&format!("keyword '{}'", word))
            }
            kind => EvalError::Malformed {
                message: format!("unexpected {}", kind),
                position,
            },
        }
    }

    fn expect_closer(&mut self) -> Result<bool, EvalError> {
        // true when the range end is inclusive
        match self.current().map(|t| &t.kind) {
            Some(TokenKind::RBracket) => {
                self.advance();
                Ok(true)
            }
            Some(TokenKind::RParen) => {
                self.advance();
                Ok(false)
            }
            Some(TokenKind::Comma) => Err(EvalError::Unsupported {
                construct: "sequence literal with more than two elements".to_string(),
                position: self.position(),
            }),
            _ => Err(self.unexpected()),
        }
    }

    fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
        Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn parse_bit_or(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_bit_xor()?;
        while self.check(&TokenKind::Pipe) {
            self.advance();
            let right = self.parse_bit_xor()?;
            left = Self::binary(BinOp::BitOr, left, right);
        }
        Ok(left)
    }

    fn parse_bit_xor(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_bit_and()?;
        while self.check(&TokenKind::Caret) {
            self.advance();
            let right = self.parse_bit_and()?;
            left = Self::binary(BinOp::BitXor, left, right);
        }
        Ok(left)
    }

    fn parse_bit_and(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_shift()?;
        while self.check(&TokenKind::Ampersand) {
            self.advance();
            let right = self.parse_shift()?;
            left = Self::binary(BinOp::BitAnd, left, right);
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.current().map(|t| &t.kind) {
                Some(TokenKind::Shl) => BinOp::ShiftLeft,
                Some(TokenKind::Shr) => BinOp::ShiftRight,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Self::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current().map(|t| &t.kind) {
                Some(TokenKind::Plus) => BinOp::Add,
                Some(TokenKind::Minus) => BinOp::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Self::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current().map(|t| &t.kind) {
                Some(TokenKind::Star) => BinOp::Multiply,
                Some(TokenKind::Slash) => BinOp::Divide,
                Some(TokenKind::DoubleSlash) => BinOp::FloorDivide,
                Some(TokenKind::Percent) => BinOp::Modulo,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Self::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, EvalError> {
        let op = match self.current().map(|t| &t.kind) {
            Some(TokenKind::Minus) => UnaryOp::Negate,
            Some(TokenKind::Plus) => UnaryOp::Plus,
            Some(TokenKind::Tilde) => UnaryOp::Invert,
            _ => return self.parse_power(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_power(&mut self) -> Result<Expr, EvalError> {
        let base = self.parse_postfix()?;
        if self.check(&TokenKind::DoubleStar) {
            self.advance();
            // Right-associative, and `2 ** -1` is legal
            let exponent = self.parse_unary()?;
            return Ok(Self::binary(BinOp::Power, base, exponent));
        }
        Ok(base)
    }

    /// A primary followed by anything call- or access-like is rejected here
    fn parse_postfix(&mut self) -> Result<Expr, EvalError> {
        let expr = self.parse_primary()?;
        let construct = match self.current().map(|t| &t.kind) {
            Some(TokenKind::LParen) => "call",
            Some(TokenKind::LBracket) => "indexing",
            Some(TokenKind::Dot) => "attribute access",
            _ => return Ok(expr),
        };
        Err(EvalError::Unsupported {
            construct: construct.to_string(),
            position: self.position(),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, EvalError> {
        let Some(token) = self.current() else {
            return Err(self.unexpected());
        };
        match &token.kind {
            TokenKind::Integer(n) => {
                self.advance();
                Ok(Expr::Integer(*n))
            }
            TokenKind::Float(n) => {
                self.advance();
                Ok(Expr::Float(*n))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::String(s.clone()))
            }
            TokenKind::Variable(name) => {
                self.advance();
                Ok(Expr::Variable {
                    name: name.clone(),
                    position: token.position,
                })
            }
            TokenKind::Identifier(name) => self.parse_identifier(name, token.position),
            TokenKind::LParen => {
                self.advance();
                self.parse_paren()
            }
            TokenKind::LBracket => {
                self.advance();
                self.parse_bracket()
            }
            TokenKind::LBrace => {
                self.advance();
                self.parse_set_literal()
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_identifier(&mut self, name: &str, position: Position) -> Result<Expr, EvalError> {
        if RESERVED.contains(&name) {
            return Err(self.unexpected());
        }
        match self.peek_kind(1) {
            Some(TokenKind::LParen) if name == "print" => {
                self.pos += 2; // print (
                let argument = self.parse_expression()?;
                if !self.check(&TokenKind::RParen) {
                    if self.check(&TokenKind::Comma) {
                        return Err(EvalError::Unsupported {
                            construct: "print with more than one argument".to_string(),
                            position: self.position(),
                        });
                    }
                    return Err(self.unexpected());
                }
                self.advance();
                Ok(Expr::Print(Box::new(argument)))
            }
            Some(TokenKind::LParen) => Err(EvalError::Unsupported {
                construct: format!("call to '{}'", name),
                position,
            }),
            // Macros are only ever read through the `$` sigil
            _ => Err(EvalError::Unsupported {
                construct: format!("bare name '{}' (macro references are written ${})", name, name),
                position,
            }),
        }
    }

    /// After `(`: grouping, or an exclusive-lower range `(a, b]` / `(a, b)`
    fn parse_paren(&mut self) -> Result<Expr, EvalError> {
        if self.check(&TokenKind::RParen) {
            return Err(EvalError::Unsupported {
                construct: "empty tuple".to_string(),
                position: self.position(),
            });
        }
        let first = self.parse_expression()?;
        if self.check(&TokenKind::RParen) {
            self.advance();
            return Ok(first);
        }
        if !self.check(&TokenKind::Comma) {
            return Err(self.unexpected());
        }
        self.advance();
        let upper = self.parse_expression()?;
        let upper_inclusive = self.expect_closer()?;
        Ok(Expr::Range {
            lower: Box::new(first),
            upper: Box::new(upper),
            lower_inclusive: false,
            upper_inclusive,
        })
    }

    /// After `[`: an inclusive-lower range `[a, b]` / `[a, b)`
    fn parse_bracket(&mut self) -> Result<Expr, EvalError> {
        let start = self.position();
        if self.check(&TokenKind::RBracket) {
            return Err(EvalError::Unsupported {
                construct: "list literal".to_string(),
                position: start,
            });
        }
        let lower = self.parse_expression()?;
        if self.check(&TokenKind::RBracket) {
            return Err(EvalError::Unsupported {
                construct: "list literal".to_string(),
                position: start,
            });
        }
        if !self.check(&TokenKind::Comma) {
            return Err(self.unexpected());
        }
        self.advance();
        let upper = self.parse_expression()?;
        let upper_inclusive = self.expect_closer()?;
        Ok(Expr::Range {
            lower: Box::new(lower),
            upper: Box::new(upper),
            lower_inclusive: true,
            upper_inclusive,
        })
    }

    fn parse_set_literal(&mut self) -> Result<Expr, EvalError> {
        let mut elements = vec![];
        while !self.check(&TokenKind::RBrace) {
            elements.push(self.parse_expression()?);
            if self.check(&TokenKind::Comma) {
                self.advance();
            } else if !self.check(&TokenKind::RBrace) {
                return Err(self.unexpected());
            }
        }
        self.advance(); // Consume '}'
        Ok(Expr::Set(elements))
    }
}

/// Evaluates expressions against resolved macros and extra bindings.
///
/// Values passed to `print(...)` are collected in order and logged under the
/// `gql::print` target.
pub struct Evaluator<'a> {
    macros: &'a MacroTable,
    bindings: IndexMap<String, Value>,
    printed: Vec<Value>,
}

impl<'a> Evaluator<'a> {
    pub fn new(macros: &'a MacroTable) -> Self {
        Evaluator {
            macros,
            bindings: IndexMap::new(),
            printed: Vec::new(),
        }
    }

    /// Adds a binding that shadows a macro of the same name
    pub fn with_binding(mut self, name: impl Into<String>, value: Value) -> Self {
        self.bindings.insert(name.into(), value);
        self
    }

    /// Values printed so far, in evaluation order
    pub fn printed(&self) -> &[Value] {
        &self.printed
    }

    pub fn take_printed(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.printed)
    }

    /// Lexes, parses and evaluates a standalone expression.
    ///
    /// # Examples
    ///
    /// ```
    /// use gql_lang::{Evaluator, MacroTable, Value};
    ///
    /// let macros = MacroTable::default();
    /// let mut evaluator = Evaluator::new(&macros);
    /// assert_eq!(evaluator.eval_str("-7 // 2").unwrap(), Value::Integer(-4));
    /// ```
    pub fn eval_str(&mut self, source: &str) -> Result<Value, EvalError> {
        let tokens = Lexer::new(source).tokenize()?;
        self.eval_tokens(&tokens)
    }

    pub fn eval_tokens(&mut self, tokens: &[Token]) -> Result<Value, EvalError> {
        let expr = ExprParser::new(tokens).parse()?;
        self.eval_expr(&expr)
    }

    pub fn eval_expr(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Integer(n) => Ok(Value::Integer(*n)),
            Expr::Float(n) => Ok(Value::Float(*n)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Variable { name, position } => self
                .bindings
                .get(name)
                .or_else(|| self.macros.get(name))
                .cloned()
                .ok_or_else(|| EvalError::UnboundMacro {
                    name: name.clone(),
                    position: *position,
                }),
            Expr::Range {
                lower,
                upper,
                lower_inclusive,
                upper_inclusive,
            } => {
                let lower = self.range_bound(lower)?;
                let upper = self.range_bound(upper)?;
                Ok(Value::Range(Range::new(
                    lower,
                    upper,
                    *lower_inclusive,
                    *upper_inclusive,
                )))
            }
            Expr::Set(elements) => {
                let mut set = SetLiteral::new();
                for element in elements {
                    let value = self.eval_expr(element)?;
                    if !value.is_scalar() {
                        return Err(EvalError::TypeError(format!(
                            "Set elements must be scalars, got {}",
                            value.type_name()
                        )));
                    }
                    set.insert(value);
                }
                Ok(Value::Set(set))
            }
            Expr::Unary { op, operand } => {
                let value = self.eval_expr(operand)?;
                apply_unary(*op, value)
            }
            Expr::BinaryOp { op, left, right } => {
                let left = self.eval_expr(left)?;
                let right = self.eval_expr(right)?;
                apply_binop(*op, &left, &right)
            }
            Expr::Print(argument) => {
                let value = self.eval_expr(argument)?;
                tracing::info!(target: "gql::print", "{}", value);
                self.printed.push(value.clone());
                Ok(value)
            }
        }
    }

    fn range_bound(&mut self, expr: &Expr) -> Result<f64, EvalError> {
        match self.eval_expr(expr)? {
            Value::Integer(n) => Ok(n as f64),
            Value::Float(n) => Ok(n),
            other => Err(EvalError::TypeError(format!(
                "Range bounds must be numbers, got {}",
                other.type_name()
            ))),
        }
    }
}

fn apply_unary(op: UnaryOp, value: Value) -> Result<Value, EvalError> {
    match (op, value) {
        (UnaryOp::Plus, v @ (Value::Integer(_) | Value::Float(_))) => Ok(v),
        (UnaryOp::Negate, Value::Integer(n)) => {
            n.checked_neg().map(Value::Integer).ok_or(EvalError::Overflow("-"))
        }
        (UnaryOp::Negate, Value::Float(n)) => Ok(Value::Float(-n)),
        (UnaryOp::Invert, Value::Integer(n)) => Ok(Value::Integer(!n)),
        (op, v) => {
            let symbol = match op {
                UnaryOp::Plus => "+",
                UnaryOp::Negate => "-",
                UnaryOp::Invert => "~",
            };
            Err(EvalError::TypeError(format!(
                "Bad operand type for unary {}: {}",
                symbol,
                v.type_name()
            )))
        }
    }
}

fn type_mismatch(op: BinOp, left: &Value, right: &Value) -> EvalError {
    EvalError::TypeError(format!(
        "Unsupported operand types for {}: {} and {}",
        op.symbol(),
        left.type_name(),
        right.type_name()
    ))
}

/// Exact arithmetic for mixed integer/float operands; whole results come
/// back as integers.
fn decimal_arith(op: BinOp, a: f64, b: f64) -> Option<Value> {
    let ad = Decimal::from_f64(a)?;
    let bd = Decimal::from_f64(b)?;
    let rd = match op {
        BinOp::Add => ad.checked_add(bd)?,
        BinOp::Subtract => ad.checked_sub(bd)?,
        BinOp::Multiply => ad.checked_mul(bd)?,
        _ => return None,
    };
    if rd.is_integer()
        && let Some(r) = rd.to_i64()
    {
        return Some(Value::Integer(r));
    }
    rd.to_f64().map(Value::Float)
}

fn floor_div(a: i64, b: i64) -> Result<i64, EvalError> {
    let q = a.checked_div(b).ok_or(EvalError::Overflow("//"))?;
    if a.wrapping_rem(b) != 0 && ((a < 0) != (b < 0)) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

fn floor_mod(a: i64, b: i64) -> i64 {
    let r = a.wrapping_rem(b);
    if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r }
}

fn shift_count(n: i64) -> Result<u32, EvalError> {
    u32::try_from(n)
        .ok()
        .filter(|n| *n < 64)
        .ok_or_else(|| EvalError::TypeError(format!("Shift count must be in 0..64, got {}", n)))
}

fn apply_int_binop(op: BinOp, a: i64, b: i64) -> Result<Value, EvalError> {
    let overflow = || EvalError::Overflow(op.symbol());
    let n = match op {
        BinOp::Add => a.checked_add(b).ok_or_else(overflow)?,
        BinOp::Subtract => a.checked_sub(b).ok_or_else(overflow)?,
        BinOp::Multiply => a.checked_mul(b).ok_or_else(overflow)?,
        BinOp::Divide => {
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            if a.wrapping_rem(b) == 0 {
                a.checked_div(b).ok_or_else(overflow)?
            } else {
                return Ok(Value::Float(a as f64 / b as f64));
            }
        }
        BinOp::FloorDivide => {
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            floor_div(a, b)?
        }
        BinOp::Modulo => {
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            floor_mod(a, b)
        }
        BinOp::Power => {
            if b < 0 {
                if a == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                return apply_float_binop(op, a as f64, b as f64);
            }
            let exponent = u32::try_from(b).map_err(|_| overflow())?;
            a.checked_pow(exponent).ok_or_else(overflow)?
        }
        BinOp::ShiftLeft => {
            let count = shift_count(b)?;
            let shifted = a << count;
            if shifted >> count != a {
                return Err(overflow());
            }
            shifted
        }
        BinOp::ShiftRight => a >> shift_count(b)?,
        BinOp::BitAnd => a & b,
        BinOp::BitOr => a | b,
        BinOp::BitXor => a ^ b,
    };
    Ok(Value::Integer(n))
}

fn apply_float_binop(op: BinOp, a: f64, b: f64) -> Result<Value, EvalError> {
    let n = match op {
        BinOp::Add => a + b,
        BinOp::Subtract => a - b,
        BinOp::Multiply => a * b,
        BinOp::Divide | BinOp::FloorDivide | BinOp::Modulo if b == 0.0 => {
            return Err(EvalError::DivisionByZero);
        }
        BinOp::Divide => a / b,
        BinOp::FloorDivide => (a / b).floor(),
        BinOp::Modulo => a - b * (a / b).floor(),
        BinOp::Power => {
            let r = a.powf(b);
            if r.is_nan() {
                return Err(EvalError::TypeError(format!(
                    "{} ** {} is not a real number",
                    a, b
                )));
            }
            r
        }
        _ => return Err(type_mismatch(op, &Value::Float(a), &Value::Float(b))),
    };
    Ok(Value::Float(n))
}

pub(crate) fn apply_binop(op: BinOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => apply_int_binop(op, *a, *b),
        (Value::Float(a), Value::Float(b)) => apply_float_binop(op, *a, *b),
        (Value::Integer(a), Value::Float(b)) => {
            let (a, b) = (*a as f64, *b);
            match decimal_arith(op, a, b) {
                Some(v) => Ok(v),
                None => apply_float_binop(op, a, b),
            }
        }
        (Value::Float(a), Value::Integer(b)) => {
            let (a, b) = (*a, *b as f64);
            match decimal_arith(op, a, b) {
                Some(v) => Ok(v),
                None => apply_float_binop(op, a, b),
            }
        }
        (Value::String(a), Value::String(b)) if op == BinOp::Add => {
            Ok(Value::String(format!("{}{}", a, b)))
        }
        (Value::Set(a), Value::Set(b)) => match op {
            BinOp::BitOr => Ok(Value::Set(a.union(b))),
            BinOp::BitAnd => Ok(Value::Set(a.intersection(b))),
            BinOp::BitXor => Ok(Value::Set(a.symmetric_difference(b))),
            BinOp::Subtract => Ok(Value::Set(a.difference(b))),
            _ => Err(type_mismatch(op, left, right)),
        },
        _ => Err(type_mismatch(op, left, right)),
    }
}
