/// Binary operators of the expression grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Arithmetic
    /// Addition or string concatenation (`+`)
    Add,
    /// Subtraction or set difference (`-`)
    Subtract,
    /// Multiplication (`*`)
    Multiply,
    /// True division (`/`)
    Divide,
    /// Floor division (`//`)
    FloorDivide,
    /// Modulo, sign of the divisor (`%`)
    Modulo,
    /// Exponentiation (`**`)
    Power,

    // Bitwise
    /// Left shift (`<<`)
    ShiftLeft,
    /// Right shift (`>>`)
    ShiftRight,
    /// Bitwise and, set intersection (`&`)
    BitAnd,
    /// Bitwise or, set union (`|`)
    BitOr,
    /// Bitwise xor, symmetric difference (`^`)
    BitXor,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Subtract => "-",
            BinOp::Multiply => "*",
            BinOp::Divide => "/",
            BinOp::FloorDivide => "//",
            BinOp::Modulo => "%",
            BinOp::Power => "**",
            BinOp::ShiftLeft => "<<",
            BinOp::ShiftRight => ">>",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `+x`
    Plus,
    /// `-x`
    Negate,
    /// `~x`, integers only
    Invert,
}
