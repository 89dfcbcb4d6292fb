use std::fmt;

/// Location of a token in the query source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Byte offset into the source
    pub offset: usize,
    /// 1-based line
    pub line: usize,
    /// 1-based column, counted in characters
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A lexed token together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Exact source slice the token was read from
    pub lexeme: String,
    pub position: Position,
    /// Number of `{`, `[` and `(` enclosing the token. A closing delimiter
    /// carries the depth of the delimiter it closes.
    pub depth: usize,
}

impl Token {
    /// Byte offset just past the end of the token
    pub fn end(&self) -> usize {
        self.position.offset + self.lexeme.len()
    }

    pub fn is(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.kind) == std::mem::discriminant(kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    /// Floating-point number
    ///
    /// # Examples
    /// ```text
    /// 3.14
    /// 0.5
    /// ```
    Float(f64),

    /// Integer
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 100
    /// ```
    Integer(i64),

    /// String literal in single or double quotes, escapes already decoded
    ///
    /// # Examples
    /// ```text
    /// "India"
    /// 'Movie A'
    /// ```
    String(String),

    // Identifiers and References
    /// Column, alias or binding name
    ///
    /// Must start with letter or underscore, followed by letters, digits, or underscores.
    ///
    /// # Examples
    /// ```text
    /// director_id
    /// d_id
    /// ```
    Identifier(String),

    /// Table reference in angle brackets
    ///
    /// # Examples
    /// ```text
    /// <directors>
    /// <movies>
    /// ```
    TableRef(String),

    /// Macro reference or declaration (`$name`)
    ///
    /// # Examples
    /// ```text
    /// $min_budget
    /// $countries
    /// ```
    Variable(String),

    // Markers
    /// Strict marker in front of a table, also rejected `!` elsewhere
    ///
    /// # Examples
    /// ```text
    /// !<movies> { name }
    /// ```
    Exclamation,

    /// Internal marker in front of a field, bitwise invert in expressions
    ///
    /// # Examples
    /// ```text
    /// ~country : {"India"}
    /// ~5
    /// ```
    Tilde,

    /// Pluck marker next to a block brace, multiplication in expressions
    ///
    /// # Examples
    /// ```text
    /// <movies> *{ name }
    /// 2 * 3
    /// ```
    Star,

    /// Alias or bind operator
    ///
    /// # Examples
    /// ```text
    /// id := d_id
    /// $max := 100
    /// ```
    ColonEqual,

    /// Context equality
    ///
    /// # Examples
    /// ```text
    /// director_id = d_id
    /// ```
    Equal,

    // Arithmetic
    /// Addition or string concatenation (`+`)
    Plus,
    /// Subtraction or set difference (`-`)
    Minus,
    /// Power (`**`)
    DoubleStar,
    /// True division (`/`)
    Slash,
    /// Floor division (`//`)
    DoubleSlash,
    /// Modulo (`%`)
    Percent,

    // Bitwise
    /// Left shift (`<<`)
    Shl,
    /// Right shift (`>>`)
    Shr,
    /// Bitwise and, set intersection (`&`)
    Ampersand,
    /// Bitwise or, set union (`|`)
    Pipe,
    /// Bitwise xor, symmetric difference (`^`)
    Caret,

    // Comparison. Lexed so the evaluator can reject them by name.
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    LtEq,
    /// `>=`
    GtEq,

    // Delimiters
    /// Left bracket (inclusive range start)
    LBracket,
    /// Right bracket (inclusive range end)
    RBracket,
    /// Left parenthesis (grouping, exclusive range start, print call)
    LParen,
    /// Right parenthesis
    RParen,
    /// Left brace (block or set literal)
    LBrace,
    /// Right brace
    RBrace,
    /// Dot, only ever reported as unsupported attribute access
    Dot,
    /// Field, declaration and element separator
    Comma,
    /// Filter separator (`budget : [50, 100]`)
    Colon,

    /// End of input
    Eof,
}

impl TokenKind {
    /// Opening delimiters raise the nesting depth
    pub fn opens(&self) -> bool {
        matches!(self, TokenKind::LBrace | TokenKind::LBracket | TokenKind::LParen)
    }

    /// Closing delimiters lower it; `[a, b)` is legal so the kinds do not
    /// have to pair up.
    pub fn closes(&self) -> bool {
        matches!(self, TokenKind::RBrace | TokenKind::RBracket | TokenKind::RParen)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Float(n) => write!(f, "number {}", n),
            TokenKind::Integer(n) => write!(f, "number {}", n),
            TokenKind::String(s) => write!(f, "string {:?}", s),
            TokenKind::Identifier(s) => write!(f, "identifier '{}'", s),
            TokenKind::TableRef(s) => write!(f, "table <{}>", s),
            TokenKind::Variable(s) => write!(f, "macro ${}", s),
            TokenKind::Exclamation => write!(f, "'!'"),
            TokenKind::Tilde => write!(f, "'~'"),
            TokenKind::Star => write!(f, "'*'"),
            TokenKind::ColonEqual => write!(f, "':='"),
            TokenKind::Equal => write!(f, "'='"),
            TokenKind::Plus => write!(f, "'+'"),
            TokenKind::Minus => write!(f, "'-'"),
            TokenKind::DoubleStar => write!(f, "'**'"),
            TokenKind::Slash => write!(f, "'/'"),
            TokenKind::DoubleSlash => write!(f, "'//'"),
            TokenKind::Percent => write!(f, "'%'"),
            TokenKind::Shl => write!(f, "'<<'"),
            TokenKind::Shr => write!(f, "'>>'"),
            TokenKind::Ampersand => write!(f, "'&'"),
            TokenKind::Pipe => write!(f, "'|'"),
            TokenKind::Caret => write!(f, "'^'"),
            TokenKind::EqEq => write!(f, "'=='"),
            TokenKind::NotEq => write!(f, "'!='"),
            TokenKind::Lt => write!(f, "'<'"),
            TokenKind::Gt => write!(f, "'>'"),
            TokenKind::LtEq => write!(f, "'<='"),
            TokenKind::GtEq => write!(f, "'>='"),
            TokenKind::LBracket => write!(f, "'['"),
            TokenKind::RBracket => write!(f, "']'"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::LBrace => write!(f, "'{{'"),
            TokenKind::RBrace => write!(f, "'}}'"),
            TokenKind::Dot => write!(f, "'.'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Colon => write!(f, "':'"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}
