// tests/lexer_tests.rs

use gql_lang::ast::TokenKind;
use gql_lang::lexer::Lexer;

fn kinds(input: &str) -> Vec<TokenKind> {
    Lexer::new(input)
        .tokenize()
        .unwrap()
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

// ============================================================================
// Single Character Tokens
// ============================================================================

#[test]
fn test_single_char_tokens() {
    let test_cases = vec![
        ("!", TokenKind::Exclamation),
        ("~", TokenKind::Tilde),
        ("*", TokenKind::Star),
        ("=", TokenKind::Equal),
        ("+", TokenKind::Plus),
        ("-", TokenKind::Minus),
        ("/", TokenKind::Slash),
        ("%", TokenKind::Percent),
        ("&", TokenKind::Ampersand),
        ("|", TokenKind::Pipe),
        ("^", TokenKind::Caret),
        ("<", TokenKind::Lt),
        (">", TokenKind::Gt),
        ("(", TokenKind::LParen),
        (")", TokenKind::RParen),
        ("[", TokenKind::LBracket),
        ("]", TokenKind::RBracket),
        ("{", TokenKind::LBrace),
        ("}", TokenKind::RBrace),
        (".", TokenKind::Dot),
        (",", TokenKind::Comma),
        (":", TokenKind::Colon),
    ];

    for (input, expected) in test_cases {
        let mut lexer = Lexer::new(input);
        let token = lexer.next_token().unwrap();
        assert_eq!(token.kind, expected, "Failed for input: {}", input);
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Eof);
    }
}

// ============================================================================
// Two Character Tokens
// ============================================================================

#[test]
fn test_two_char_tokens() {
    let test_cases = vec![
        (":=", TokenKind::ColonEqual),
        ("==", TokenKind::EqEq),
        ("!=", TokenKind::NotEq),
        ("<=", TokenKind::LtEq),
        (">=", TokenKind::GtEq),
        ("<<", TokenKind::Shl),
        (">>", TokenKind::Shr),
        ("**", TokenKind::DoubleStar),
        ("//", TokenKind::DoubleSlash),
    ];

    for (input, expected) in test_cases {
        let mut lexer = Lexer::new(input);
        let token = lexer.next_token().unwrap();
        assert_eq!(token.kind, expected, "Failed for input: {}", input);
        assert_eq!(token.lexeme, input);
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Eof);
    }
}

#[test]
fn test_colon_vs_assign() {
    assert_eq!(
        kinds("a : b := c"),
        vec![
            TokenKind::Identifier("a".into()),
            TokenKind::Colon,
            TokenKind::Identifier("b".into()),
            TokenKind::ColonEqual,
            TokenKind::Identifier("c".into()),
            TokenKind::Eof,
        ]
    );
}

// ============================================================================
// Table markers and macros
// ============================================================================

#[test]
fn test_table_markers() {
    assert_eq!(
        kinds("<directors> <movie_2>"),
        vec![
            TokenKind::TableRef("directors".into()),
            TokenKind::TableRef("movie_2".into()),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_incomplete_marker_falls_back_to_operators() {
    assert_eq!(
        kinds("a <b c"),
        vec![
            TokenKind::Identifier("a".into()),
            TokenKind::Lt,
            TokenKind::Identifier("b".into()),
            TokenKind::Identifier("c".into()),
            TokenKind::Eof,
        ]
    );
    assert_eq!(
        kinds("1 <= 2"),
        vec![TokenKind::Integer(1), TokenKind::LtEq, TokenKind::Integer(2), TokenKind::Eof]
    );
}

#[test]
fn test_macro_reference() {
    assert_eq!(
        kinds("$budget := [$low, $high)"),
        vec![
            TokenKind::Variable("budget".into()),
            TokenKind::ColonEqual,
            TokenKind::LBracket,
            TokenKind::Variable("low".into()),
            TokenKind::Comma,
            TokenKind::Variable("high".into()),
            TokenKind::RParen,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_bare_dollar_is_an_error() {
    let err = Lexer::new("$ 1").tokenize().unwrap_err();
    assert!(err.message.contains("macro name"));
    assert_eq!(err.position.column, 1);
}

// ============================================================================
// Literals
// ============================================================================

#[test]
fn test_numbers() {
    assert_eq!(
        kinds("42 2.5 1.x"),
        vec![
            TokenKind::Integer(42),
            TokenKind::Float(2.5),
            TokenKind::Integer(1),
            TokenKind::Dot,
            TokenKind::Identifier("x".into()),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_integer_out_of_range() {
    let err = Lexer::new("99999999999999999999").tokenize().unwrap_err();
    assert!(err.message.contains("out of range"));
}

#[test]
fn test_strings_and_escapes() {
    assert_eq!(
        kinds(r#""India" 'it\'s' "a\tb\n""#),
        vec![
            TokenKind::String("India".into()),
            TokenKind::String("it's".into()),
            TokenKind::String("a\tb\n".into()),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_string_lexeme_is_source_slice() {
    let tokens = Lexer::new(r#"x : "a\"b""#).tokenize().unwrap();
    assert_eq!(tokens[2].kind, TokenKind::String("a\"b".into()));
    assert_eq!(tokens[2].lexeme, r#""a\"b""#);
}

#[test]
fn test_unterminated_string() {
    let err = Lexer::new("\n  \"open").tokenize().unwrap_err();
    assert!(err.message.contains("Unterminated string"));
    assert_eq!(err.position.line, 2);
    assert_eq!(err.position.column, 3);
}

#[test]
fn test_invalid_escape() {
    let err = Lexer::new(r#""\q""#).tokenize().unwrap_err();
    assert!(err.message.contains("Invalid escape"));
}

#[test]
fn test_unexpected_character() {
    let err = Lexer::new("<movies> { @ }").tokenize().unwrap_err();
    assert!(err.message.contains("'@'"));
    assert_eq!(err.position.offset, 11);
    assert!(err.to_string().starts_with("Lex error at 1:12"));
}

// ============================================================================
// Comments, positions, depth
// ============================================================================

#[test]
fn test_comments_are_skipped() {
    assert_eq!(
        kinds("<movies> { # the title\n title }"),
        vec![
            TokenKind::TableRef("movies".into()),
            TokenKind::LBrace,
            TokenKind::Identifier("title".into()),
            TokenKind::RBrace,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_positions() {
    let tokens = Lexer::new("<a> {\n  b\n}").tokenize().unwrap();
    let b = &tokens[2];
    assert_eq!(b.kind, TokenKind::Identifier("b".into()));
    assert_eq!((b.position.line, b.position.column, b.position.offset), (2, 3, 8));
    assert_eq!(b.end(), 9);
}

#[test]
fn test_depth_of_nested_blocks() {
    let tokens = Lexer::new("<a> { <b> { c } }").tokenize().unwrap();
    let depths: Vec<usize> = tokens.iter().map(|t| t.depth).collect();
    // <a> { <b> { c } } eof
    assert_eq!(depths, vec![0, 0, 1, 1, 2, 1, 0, 0]);
}

#[test]
fn test_stray_closer_does_not_underflow() {
    let tokens = Lexer::new(") x").tokenize().unwrap();
    assert_eq!(tokens[0].depth, 0);
    assert_eq!(tokens[1].depth, 0);
}
