use crate::ast::{BinOp, Position, UnaryOp};

/// Node of the restricted expression grammar used by macros and filters.
///
/// The set of variants is the whole language: there is no call node besides
/// [`Expr::Print`] and no attribute or index access.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Literals
    /// Literal integer
    ///
    /// # Example
    /// ```text
    /// 42
    /// ```
    Integer(i64),

    /// Literal floating point number
    ///
    /// # Example
    /// ```text
    /// 2.5
    /// ```
    Float(f64),

    /// String literal
    ///
    /// # Example
    /// ```text
    /// "India"
    /// ```
    String(String),

    /// Macro reference, `$name`
    Variable { name: String, position: Position },

    /// Interval literal
    ///
    /// # Examples
    /// ```text
    /// [50, 100]
    /// ($low, $high)
    /// [0, 10)
    /// ```
    Range {
        lower: Box<Expr>,
        upper: Box<Expr>,
        lower_inclusive: bool,
        upper_inclusive: bool,
    },

    /// Set literal
    ///
    /// # Example
    /// ```text
    /// {"India", "USA"}
    /// ```
    Set(Vec<Expr>),

    // Operations
    /// Unary operation (`-x`, `+x`, `~x`)
    Unary { op: UnaryOp, operand: Box<Expr> },

    /// Binary operation (arithmetic, bitwise, set)
    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Debug print; evaluates to its argument
    ///
    /// # Example
    /// ```text
    /// print($budget)
    /// ```
    Print(Box<Expr>),
}
