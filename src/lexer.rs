use thiserror::Error;

pub use crate::ast::tokens::Position;
use crate::ast::{Token, TokenKind};

/// Raised when the source contains something no token starts with.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Lex error at {position}: {message}")]
pub struct LexError {
    pub message: String,
    pub position: Position,
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    offset: usize,
    line: usize,
    column: usize,
    depth: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            offset: 0,
            line: 1,
            column: 1,
            depth: 0,
        }
    }

    /// Lexes the whole input. The returned sequence always ends with `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.offset += ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.position += 1;
    }

    fn advance_by(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    fn here(&self) -> Position {
        Position {
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }

    fn error(&self, message: impl Into<String>, position: Position) -> LexError {
        LexError {
            message: message.into(),
            position,
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '#' {
                while let Some(c) = self.current_char() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn is_ident_start(ch: char) -> bool {
        ch.is_alphabetic() || ch == '_'
    }

    fn is_ident_char(ch: char) -> bool {
        ch.is_alphanumeric() || ch == '_'
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if Self::is_ident_char(ch) {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    /// Length in chars of a `<name>` table marker starting at the current
    /// `<`, if there is one.
    fn table_marker_len(&self) -> Option<usize> {
        if !self.peek_char(1).is_some_and(Self::is_ident_start) {
            return None;
        }
        let mut len = 2;
        while self.peek_char(len).is_some_and(Self::is_ident_char) {
            len += 1;
        }
        (self.peek_char(len) == Some('>')).then_some(len + 1)
    }

    fn read_string(&mut self, quote: char) -> Result<String, LexError> {
        let start = self.here();
        let mut result = String::new();
        self.advance(); // Consume opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    self.advance();
                    return Ok(result);
                }
                '\\' => {
                    let escape_at = self.here();
                    self.advance(); // Consume backslash
                    match self.current_char() {
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        Some('r') => result.push('\r'),
                        Some('"') => result.push('"'),
                        Some('\'') => result.push('\''),
                        Some('\\') => result.push('\\'),
                        Some(ch) => {
                            return Err(self.error(
                                format!("Invalid escape sequence: \\{}", ch),
                                escape_at,
                            ));
                        }
                        None => {
                            return Err(self.error(
                                "Unterminated string: unexpected end of input after backslash",
                                start,
                            ));
                        }
                    }
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(self.error("Unterminated string: missing closing quote", start))
    }

    fn read_number(&mut self) -> Result<TokenKind, LexError> {
        let start = self.here();
        let mut number = String::new();
        let mut is_float = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else if ch == '.'
                && !is_float
                && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
            {
                is_float = true;
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if is_float {
            number
                .parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| self.error(format!("Invalid number '{}'", number), start))
        } else {
            number
                .parse::<i64>()
                .map(TokenKind::Integer)
                .map_err(|_| self.error(format!("Integer literal '{}' is out of range", number), start))
        }
    }

    /// Consumes `len` chars and yields `kind`.
    fn symbol(&mut self, len: usize, kind: TokenKind) -> Result<TokenKind, LexError> {
        self.advance_by(len);
        Ok(kind)
    }

    fn next_kind(&mut self) -> Result<TokenKind, LexError> {
        let start = self.here();
        let next = self.peek_char(1);

        match self.current_char() {
            None => Ok(TokenKind::Eof),
            Some('$') => {
                if next.is_some_and(Self::is_ident_start) {
                    self.advance();
                    Ok(TokenKind::Variable(self.read_identifier()))
                } else {
                    Err(self.error("Expected a macro name after '$'", start))
                }
            }
            // Table markers win over every '<' operator
            Some('<') if self.table_marker_len().is_some() => {
                self.advance(); // '<'
                let name = self.read_identifier();
                self.advance(); // '>'
                Ok(TokenKind::TableRef(name))
            }
            Some('<') => match next {
                Some('<') => self.symbol(2, TokenKind::Shl),
                Some('=') => self.symbol(2, TokenKind::LtEq),
                _ => self.symbol(1, TokenKind::Lt),
            },
            Some('>') => match next {
                Some('>') => self.symbol(2, TokenKind::Shr),
                Some('=') => self.symbol(2, TokenKind::GtEq),
                _ => self.symbol(1, TokenKind::Gt),
            },
            Some('*') if next == Some('*') => self.symbol(2, TokenKind::DoubleStar),
            Some('*') => self.symbol(1, TokenKind::Star),
            Some('/') if next == Some('/') => self.symbol(2, TokenKind::DoubleSlash),
            Some('/') => self.symbol(1, TokenKind::Slash),
            Some(':') if next == Some('=') => self.symbol(2, TokenKind::ColonEqual),
            Some(':') => self.symbol(1, TokenKind::Colon),
            Some('=') if next == Some('=') => self.symbol(2, TokenKind::EqEq),
            Some('=') => self.symbol(1, TokenKind::Equal),
            Some('!') if next == Some('=') => self.symbol(2, TokenKind::NotEq),
            Some('!') => self.symbol(1, TokenKind::Exclamation),
            Some('~') => self.symbol(1, TokenKind::Tilde),
            Some('+') => self.symbol(1, TokenKind::Plus),
            Some('-') => self.symbol(1, TokenKind::Minus),
            Some('%') => self.symbol(1, TokenKind::Percent),
            Some('&') => self.symbol(1, TokenKind::Ampersand),
            Some('|') => self.symbol(1, TokenKind::Pipe),
            Some('^') => self.symbol(1, TokenKind::Caret),
            Some('.') => self.symbol(1, TokenKind::Dot),
            Some(',') => self.symbol(1, TokenKind::Comma),
            Some('{') => self.symbol(1, TokenKind::LBrace),
            Some('}') => self.symbol(1, TokenKind::RBrace),
            Some('[') => self.symbol(1, TokenKind::LBracket),
            Some(']') => self.symbol(1, TokenKind::RBracket),
            Some('(') => self.symbol(1, TokenKind::LParen),
            Some(')') => self.symbol(1, TokenKind::RParen),
            Some('"') => Ok(TokenKind::String(self.read_string('"')?)),
            Some('\'') => Ok(TokenKind::String(self.read_string('\'')?)),
            Some(ch) if Self::is_ident_start(ch) => Ok(TokenKind::Identifier(self.read_identifier())),
            Some(ch) if ch.is_ascii_digit() => self.read_number(),
            Some(ch) => Err(self.error(format!("Unexpected character '{}'", ch), start)),
        }
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace_and_comments();

        let position = self.here();
        let first = self.position;
        let kind = self.next_kind()?;
        let lexeme: String = self.input[first..self.position].iter().collect();

        let depth = if kind.closes() {
            self.depth = self.depth.saturating_sub(1);
            self.depth
        } else {
            let depth = self.depth;
            if kind.opens() {
                self.depth += 1;
            }
            depth
        };

        Ok(Token {
            kind,
            lexeme,
            position,
            depth,
        })
    }
}

#[cfg(test)]
fn kinds(input: &str) -> Vec<TokenKind> {
    Lexer::new(input)
        .tokenize()
        .unwrap()
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

#[test]
fn test_table_marker_beats_comparison() {
    assert_eq!(
        kinds("<movies> a < b"),
        vec![
            TokenKind::TableRef("movies".into()),
            TokenKind::Identifier("a".into()),
            TokenKind::Lt,
            TokenKind::Identifier("b".into()),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_shift_is_not_a_table() {
    assert_eq!(
        kinds("1 << 2 >> 3"),
        vec![
            TokenKind::Integer(1),
            TokenKind::Shl,
            TokenKind::Integer(2),
            TokenKind::Shr,
            TokenKind::Integer(3),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_depth_tracks_mismatched_range() {
    let tokens = Lexer::new("{ b : [1, 2), c }").tokenize().unwrap();
    let depths: Vec<usize> = tokens.iter().map(|t| t.depth).collect();
    // {  b  :  [  1  ,  2  )  ,  c  }  eof
    assert_eq!(depths, vec![0, 1, 1, 1, 2, 2, 2, 1, 1, 1, 0, 0]);
}
