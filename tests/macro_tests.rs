// tests/macro_tests.rs

use gql_lang::evaluator::EvalError;
use gql_lang::lexer::Lexer;
use gql_lang::macros::{Declaration, MacroError, MacroResolver, MacroTable};
use gql_lang::parser::{ParseError, global_block};
use gql_lang::value::{Range, SetLiteral, Value};
use gql_lang::{Error, compile};

fn resolve(source: &str) -> Result<MacroTable, Error> {
    compile(source).map(|compiled| compiled.macros)
}

fn macro_error(source: &str) -> MacroError {
    match resolve(source) {
        Err(Error::Macro(e)) => e,
        other => panic!("Expected a macro error for {:?}, got {:?}", source, other),
    }
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn test_chained_macros() {
    let macros = resolve(
        "global {
            $low := 50,
            $high := $low * 2,
            $budget := [$low, $high),
        }",
    )
    .unwrap();

    assert_eq!(macros.len(), 3);
    assert_eq!(macros.get("low"), Some(&Value::Integer(50)));
    assert_eq!(macros.get("high"), Some(&Value::Integer(100)));
    assert_eq!(
        macros.get("budget"),
        Some(&Value::Range(Range::new(50.0, 100.0, true, false)))
    );
}

#[test]
fn test_forward_references() {
    let macros = resolve("global { $a := $b + 1, $b := $c * 2, $c := 3 }").unwrap();
    assert_eq!(macros.get("a"), Some(&Value::Integer(7)));
}

#[test]
fn test_substitution_respects_precedence() {
    // $sum expands to a parenthesized group, not raw text
    let macros = resolve("global { $sum := 1 + 2, $x := $sum * 3 }").unwrap();
    assert_eq!(macros.get("x"), Some(&Value::Integer(9)));
}

#[test]
fn test_strings_are_not_rewritten() {
    let macros = resolve(r#"global { $a := 1, $s := "cost: $a" }"#).unwrap();
    assert_eq!(macros.get("s"), Some(&Value::String("cost: $a".into())));
}

#[test]
fn test_set_macros() {
    let macros = resolve(r#"global { $asia := {"India", "Japan"}, $all := $asia | {"USA"} }"#).unwrap();
    let expected = SetLiteral::from_values(vec![
        Value::from("India"),
        Value::from("Japan"),
        Value::from("USA"),
    ]);
    assert_eq!(macros.get("all"), Some(&Value::Set(expected)));
}

#[test]
fn test_declaration_order_is_kept() {
    let macros = resolve("global { $z := 1, $a := 2, $m := 3 }").unwrap();
    let names: Vec<&str> = macros.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["z", "a", "m"]);
}

#[test]
fn test_resolution_is_idempotent() {
    let source = "global { $low := 50, $high := $low * 2, $r := ($low, $high] }";
    assert_eq!(resolve(source).unwrap(), resolve(source).unwrap());
}

#[test]
fn test_empty_and_missing_global_block() {
    assert!(resolve("global { }").unwrap().is_empty());
    assert!(resolve("<movies> { title }").unwrap().is_empty());
}

#[test]
fn test_print_statements() {
    let compiled = compile("global { $x := 2, print($x * 3), print(\"done\") }").unwrap();
    assert_eq!(compiled.macros.len(), 1);
    assert_eq!(compiled.printed, vec![Value::Integer(6), Value::String("done".into())]);
}

// ============================================================================
// Phases
// ============================================================================

#[test]
fn test_collect_keeps_raw_text() {
    let source = "global { $low := 50, $high := $low  *  2, print($high) }";
    let tokens = Lexer::new(source).tokenize().unwrap();
    let body = global_block(&tokens).unwrap().unwrap();
    let declarations = MacroResolver::new(source).collect(body).unwrap();

    assert_eq!(declarations.len(), 3);
    assert_eq!(declarations[1].raw(), "$low  *  2");
    assert!(matches!(&declarations[2], Declaration::Print { raw, .. } if raw == "print($high)"));
}

#[test]
fn test_substitute_reaches_fixed_point() {
    let source = "global { $a := $b, $b := 1 }";
    let tokens = Lexer::new(source).tokenize().unwrap();
    let body = global_block(&tokens).unwrap().unwrap();
    let mut declarations = MacroResolver::new(source).collect(body).unwrap();

    MacroResolver::substitute(&mut declarations).unwrap();
    assert_eq!(declarations[0].raw(), "(1)");
    assert_eq!(declarations[1].raw(), "1");
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_self_reference_is_cyclic() {
    assert_eq!(
        macro_error("global { $a := $a + 1 }"),
        MacroError::Cyclic { names: vec!["a".into()] }
    );
}

#[test]
fn test_mutual_reference_is_cyclic() {
    let err = macro_error("global { $ok := 1, $a := $b, $b := $a }");
    assert_eq!(err, MacroError::Cyclic { names: vec!["a".into(), "b".into()] });
    assert_eq!(err.to_string(), "Cyclic macro definitions: $a, $b");
}

#[test]
fn test_long_cycle_is_reported() {
    let err = macro_error("global { $a := $b + 1, $b := $c + 1, $c := $a + 1 }");
    assert!(matches!(err, MacroError::Cyclic { names } if names.len() == 3));
}

#[test]
fn test_unbound_reference() {
    assert_eq!(
        macro_error("global { $a := $missing * 2 }"),
        MacroError::Unbound {
            name: "missing".into(),
            referenced_by: "$a".into(),
        }
    );
}

#[test]
fn test_duplicate_declaration() {
    assert!(matches!(
        macro_error("global { $a := 1, $a := 2 }"),
        MacroError::Syntax(e) if e.message.contains("declared twice")
    ));
}

#[test]
fn test_missing_value() {
    assert!(matches!(macro_error("global { $a := }"), MacroError::Syntax(_)));
}

#[test]
fn test_bad_entry() {
    assert!(matches!(macro_error("global { low := 1 }"), MacroError::Syntax(_)));
}

#[test]
fn test_unsupported_expression_is_fatal() {
    let err = macro_error(r#"global { $a := __import__("os") }"#);
    assert!(matches!(
        err,
        MacroError::Eval { name, source: EvalError::Unsupported { .. } } if name == "$a"
    ));
}

#[test]
fn test_only_one_global_block() {
    let err = resolve("global { $a := 1 } global { $b := 2 }").unwrap_err();
    assert!(matches!(err, Error::Parse(ParseError::Syntax(_))));
}
