// tests/integration_tests.rs

use gql_lang::executor::{ExecError, ExecutionContext, Executor, ResultValue, run_query};
use gql_lang::output::{document_json, document_value, to_json, to_json_pretty};
use gql_lang::source::MemorySource;
use gql_lang::value::Value;
use gql_lang::{Error, compile, run};

fn s(text: &str) -> Value {
    Value::String(text.to_string())
}

fn n(value: i64) -> Value {
    Value::Integer(value)
}

fn film_tables() -> MemorySource {
    MemorySource::new()
        .with_table(
            "directors",
            vec![
                vec![("id", s("d1")), ("name", s("Nolan")), ("country", s("UK"))],
                vec![("id", s("d2")), ("name", s("Ray")), ("country", s("India"))],
            ],
        )
        .with_table(
            "movies",
            vec![
                vec![("id", n(1)), ("title", s("Movie A")), ("director_id", s("d1")), ("budget", n(50))],
                vec![("id", n(2)), ("title", s("Movie B")), ("director_id", s("d1")), ("budget", n(99))],
                vec![("id", n(3)), ("title", s("Movie C")), ("director_id", s("d3")), ("budget", n(100))],
            ],
        )
        .with_table(
            "reviews",
            vec![
                vec![("movie_id", n(1)), ("score", n(8))],
                vec![("movie_id", n(1)), ("score", n(6))],
                vec![("movie_id", s("2")), ("score", n(9))],
            ],
        )
}

fn query(source: &str) -> String {
    let results = run(source, &film_tables()).unwrap();
    to_json(&document_value(&results))
}

fn exec_error(source: &str) -> ExecError {
    match run(source, &film_tables()) {
        Err(Error::Exec(e)) => e,
        other => panic!("Expected an execution error for {:?}, got {:?}", source, other),
    }
}

// ============================================================================
// Joins
// ============================================================================

fn scenario_tables() -> MemorySource {
    MemorySource::new()
        .with_table(
            "directors",
            vec![
                vec![("id", s("d1")), ("country", s("India"))],
                vec![("id", s("d2")), ("country", s("USA"))],
            ],
        )
        .with_table(
            "movies",
            vec![
                vec![("name", s("Movie A")), ("director_id", s("d1"))],
                vec![("name", s("Movie B")), ("director_id", s("d1"))],
            ],
        )
}

#[test]
fn test_directors_and_titles() {
    let results = run(
        "<directors> { id := d_id, movies *{ name, director_id = d_id } := titles }",
        &scenario_tables(),
    )
    .unwrap();
    assert_eq!(
        to_json(&results["directors"].clone().into_value()),
        r#"[{"d_id":"d1","titles":["Movie A","Movie B"]},{"d_id":"d2","titles":[]}]"#
    );
}

#[test]
fn test_strict_nested_table_drops_parent_row() {
    let results = run(
        "<directors> { id := d_id, !movies *{ name, director_id = d_id } := titles }",
        &scenario_tables(),
    )
    .unwrap();
    assert_eq!(
        to_json(&results["directors"].clone().into_value()),
        r#"[{"d_id":"d1","titles":["Movie A","Movie B"]}]"#
    );
}

#[test]
fn test_join_field_with_key_is_output() {
    let results = run(
        "<directors> { id := d_id, movies { name, director_id = d_id := by } }",
        &scenario_tables(),
    )
    .unwrap();
    assert_eq!(
        to_json(&document_value(&results)),
        concat!(
            r#"{"directors":["#,
            r#"{"d_id":"d1","movies":[{"name":"Movie A","by":"d1"},{"name":"Movie B","by":"d1"}]},"#,
            r#"{"d_id":"d2","movies":[]}"#,
            r#"]}"#
        )
    );
}

#[test]
fn test_internal_strict_table_only_filters() {
    let json = query(
        "<directors> {
            id := d_id,
            name,
            ~!<movies> { director_id = d_id },
        }",
    );
    assert_eq!(json, r#"{"directors":[{"d_id":"d1","name":"Nolan"}]}"#);
}

#[test]
fn test_three_level_join() {
    let json = query(
        "<directors> {
            id := d_id,
            <movies> {
                ~director_id = d_id,
                id := m_id,
                title,
                reviews* { ~movie_id = m_id, score } := scores,
            },
        }",
    );
    assert_eq!(
        json,
        concat!(
            r#"{"directors":["#,
            r#"{"d_id":"d1","movies":["#,
            r#"{"m_id":1,"title":"Movie A","scores":[8,6]},"#,
            r#"{"m_id":2,"title":"Movie B","scores":[9]}"#,
            r#"]},"#,
            r#"{"d_id":"d2","movies":[]}"#,
            r#"]}"#
        )
    );
}

#[test]
fn test_binding_matches_across_types() {
    // movie ids are integers, one review stores its key as text
    let json = query(
        "<movies> {
            id := m_id,
            ~budget : 99,
            <reviews>* { ~movie_id = m_id, score },
        }",
    );
    assert_eq!(json, r#"{"movies":[{"m_id":2,"reviews":[9]}]}"#);
}

// ============================================================================
// Filters
// ============================================================================

#[test]
fn test_budget_range() {
    let tables = MemorySource::new().with_table(
        "movies",
        vec![
            vec![("budget", n(49))],
            vec![("budget", n(50))],
            vec![("budget", n(99))],
            vec![("budget", n(100))],
        ],
    );
    let results = run("<movies>* { budget : [50, 100) := kept }", &tables).unwrap();
    assert_eq!(results["movies"], ResultValue::Values(vec![n(50), n(99)]));
}

#[test]
fn test_range_boundaries() {
    let tables = MemorySource::new().with_table(
        "movies",
        vec![vec![("budget", n(50))], vec![("budget", n(75))], vec![("budget", n(100))]],
    );
    let test_cases = vec![
        ("[50, 100]", vec![50, 75, 100]),
        ("(50, 100)", vec![75]),
        ("[50, 100)", vec![50, 75]),
        ("(50, 100]", vec![75, 100]),
    ];

    for (range, expected) in test_cases {
        let source = format!("<movies>* {{ budget : {} := kept }}", range);
        let results = run(&source, &tables).unwrap();
        let expected = ResultValue::Values(expected.into_iter().map(n).collect());
        assert_eq!(results["movies"], expected, "Failed for range: {}", range);
    }
}

#[test]
fn test_range_skips_non_numeric_cells() {
    let tables = MemorySource::new().with_table(
        "movies",
        vec![vec![("budget", s("n/a"))], vec![("budget", s("60"))], vec![("budget", Value::Null)]],
    );
    let results = run("<movies>* { budget : [50, 100] := kept }", &tables).unwrap();
    assert_eq!(results["movies"], ResultValue::Values(vec![s("60")]));
}

#[test]
fn test_set_filter_with_macro() {
    let json = query(
        r#"global { $countries := {"India", "USA"} }
        <directors>* { ~country : $countries, name }"#,
    );
    assert_eq!(json, r#"{"directors":["Ray"]}"#);
}

#[test]
fn test_literal_filter_coerces_numbers() {
    let json = query(r#"<reviews>* { ~movie_id : "2", score }"#);
    assert_eq!(json, r#"{"reviews":[9]}"#);
}

#[test]
fn test_filters_are_not_output() {
    let json = query("<movies> { title, budget : [90, 100), director_id : d1 }");
    assert_eq!(json, r#"{"movies":[{"title":"Movie B"}]}"#);
}

#[test]
fn test_filter_with_key_is_output() {
    let json = query("<movies> { title, budget : [90, 100) := cost }");
    assert_eq!(json, r#"{"movies":[{"title":"Movie B","cost":99}]}"#);
}

#[test]
fn test_bare_word_is_text_even_with_same_named_macro() {
    let json = query("global { $India := 5 } <directors>* { country : India, id }");
    assert_eq!(json, r#"{"directors":["d2"]}"#);
}

// ============================================================================
// Shaping
// ============================================================================

#[test]
fn test_key_order_follows_query() {
    let json = query("<directors> { country, name := who }");
    assert_eq!(
        json,
        r#"{"directors":[{"country":"UK","who":"Nolan"},{"country":"India","who":"Ray"}]}"#
    );
}

#[test]
fn test_pluck_needs_one_visible_field() {
    let json = query("<directors>* { name, country }");
    assert_eq!(
        json,
        r#"{"directors":[{"name":"Nolan","country":"UK"},{"name":"Ray","country":"India"}]}"#
    );
}

#[test]
fn test_internal_fields_never_output() {
    let results = run(
        "<directors> {
            ~id := d_id,
            <movies> { ~director_id = d_id, ~budget, title },
        }",
        &film_tables(),
    )
    .unwrap();

    let json = to_json(&document_value(&results));
    for hidden in ["d_id", "director_id", "budget"] {
        assert!(!json.contains(&format!("\"{}\"", hidden)), "{} leaked into {}", hidden, json);
    }
}

#[test]
fn test_duplicate_tables_in_output() {
    let json = query("<directors>* { name } <directors>* { country }");
    assert_eq!(json, r#"{"directors_0":["Nolan","Ray"],"directors_1":["UK","India"]}"#);
}

#[test]
fn test_strict_root_is_absent() {
    let results = run(r#"!<directors> { name : "Nobody" } <movies>* { ~id : 1, title }"#, &film_tables()).unwrap();
    assert!(results["directors"].is_absent());
    assert_eq!(to_json(&document_value(&results)), r#"{"movies":["Movie A"]}"#);
}

#[test]
fn test_non_strict_empty_root() {
    assert_eq!(query(r#"<directors> { name : "Nobody" }"#), r#"{"directors":[]}"#);
}

#[test]
fn test_pretty_output() {
    let results = run("<directors>* { ~country : UK, name }", &film_tables()).unwrap();
    assert_eq!(
        to_json_pretty(&document_value(&results)),
        "{\n  \"directors\": [\n    \"Nolan\"\n  ]\n}"
    );
}

#[test]
fn test_serde_json_matches_printer() {
    let results = run(
        r#"!<directors> { name : "Nobody" }
        <directors> { id := d_id, name, !<movies> { ~director_id = d_id, title, budget : 99 := cost } }"#,
        &film_tables(),
    )
    .unwrap();

    let json = document_json(&results);
    assert_eq!(serde_json::to_string(&json).unwrap(), to_json(&document_value(&results)));
    assert_eq!(
        json,
        serde_json::json!({
            "directors_1": [{"d_id": "d1", "name": "Nolan", "movies": [{"title": "Movie B", "cost": 99}]}]
        })
    );

    assert_eq!(results["directors_0"].to_json_value(), serde_json::Value::Null);
    let keys: Vec<&String> = json["directors_1"][0].as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["d_id", "name", "movies"]);
}

// ============================================================================
// Runner boundary
// ============================================================================

#[test]
fn test_run_query_single_block() {
    let compiled = compile("<movies>* { ~director_id : d1, title }").unwrap();
    let node = &compiled.document.tables["movies"];
    let result = run_query("movies", node, &film_tables()).unwrap();
    assert_eq!(result, ResultValue::Values(vec![s("Movie A"), s("Movie B")]));
    assert_eq!(result.into_value(), Value::Array(vec![s("Movie A"), s("Movie B")]));
}

#[test]
fn test_execute_with_inbound_context() {
    let compiled = compile("<movies>* { ~director_id = d_id, title }").unwrap();
    let node = &compiled.document.tables["movies"];
    let tables = film_tables();
    let context = ExecutionContext::new().extended([("d_id".to_string(), s("d3"))]);

    let result = Executor::new(&tables).execute("movies", node, &context).unwrap();
    assert_eq!(result, ResultValue::Values(vec![s("Movie C")]));
    assert!(context.len() == 1, "extending must not touch the original");
}

#[test]
fn test_context_is_copied_on_extend() {
    let base = ExecutionContext::new().extended([("a".to_string(), n(1))]);
    let child = base.extended([("a".to_string(), n(2)), ("b".to_string(), n(3))]);
    assert_eq!(base.get("a"), Some(&n(1)));
    assert_eq!(base.get("b"), None);
    assert_eq!(child.get("a"), Some(&n(2)));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_table_not_found_at_bind_time() {
    // directors would filter every row out, but the check runs first
    let err = exec_error(
        r#"<directors> { name : "Nobody", <awards> { year } }"#,
    );
    assert!(matches!(err, ExecError::TableNotFound { table } if table == "awards"));
}

#[test]
fn test_missing_table_in_later_block_stops_everything() {
    let err = exec_error("<directors> { name } <awards> { year }");
    assert!(matches!(err, ExecError::TableNotFound { table } if table == "awards"));
}

#[test]
fn test_column_not_found() {
    let err = exec_error("<movies> { rating }");
    assert!(matches!(
        err,
        ExecError::ColumnNotFound { column, table } if column == "rating" && table == "movies"
    ));
}

#[test]
fn test_unbound_variable() {
    let err = exec_error("<movies> { director_id = d_id }");
    assert!(matches!(
        err,
        ExecError::UnboundVariable { name, table } if name == "d_id" && table == "movies"
    ));
}

#[test]
fn test_sibling_bindings_are_not_visible() {
    let err = exec_error(
        "<directors> {
            <movies> { id := m_id },
            <reviews> { movie_id = m_id },
        }",
    );
    assert!(matches!(err, ExecError::UnboundVariable { name, .. } if name == "m_id"));
}
