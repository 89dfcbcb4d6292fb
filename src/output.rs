//! JSON output for query results.
//!
//! Objects are printed in declared key order, which is the order fields were
//! written in the query. Floats keep their `.0` so integer and float columns
//! stay distinguishable.
//!
//! # Examples
//!
//! ```
//! use gql_lang::Value;
//! use gql_lang::output::{to_json, to_json_pretty};
//!
//! let value = Value::Integer(42);
//!
//! assert_eq!(to_json(&value), "42");
//! assert_eq!(to_json_pretty(&value), "42");
//! ```

use indexmap::IndexMap;

use crate::{
    convert::value_to_json,
    executor::ResultValue,
    value::{Value, format_number},
};

pub struct JsonPrinter {
    pretty: bool,
}

impl JsonPrinter {
    pub fn new(pretty: bool) -> Self {
        JsonPrinter { pretty }
    }

    pub fn print(&self, value: &Value) -> String {
        self.print_value(value, 0)
    }

    fn print_value(&self, value: &Value, indent: usize) -> String {
        match value {
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Float(n) if n.is_finite() => format_number(*n),
            Value::Float(_) => "null".to_string(),
            Value::String(s) => format!("\"{}\"", self.escape_string(s)),
            Value::Range(r) => format!("\"{}\"", self.escape_string(&r.to_string())),
            Value::Set(set) => {
                let items: Vec<Value> = set.iter().cloned().collect();
                self.print_array(&items, indent)
            }
            Value::Array(arr) => self.print_array(arr, indent),
            Value::Object(obj) => self.print_object(obj, indent),
        }
    }

    fn print_array(&self, arr: &[Value], indent: usize) -> String {
        if arr.is_empty() {
            return "[]".to_string();
        }

        if self.pretty {
            let items: Vec<String> = arr
                .iter()
                .map(|v| format!("{}{}", self.indent(indent + 1), self.print_value(v, indent + 1)))
                .collect();
            format!("[\n{}\n{}]", items.join(",\n"), self.indent(indent))
        } else {
            let items: Vec<String> = arr.iter().map(|v| self.print_value(v, indent)).collect();
            format!("[{}]", items.join(","))
        }
    }

    fn print_object(&self, obj: &IndexMap<String, Value>, indent: usize) -> String {
        if obj.is_empty() {
            return "{}".to_string();
        }

        if self.pretty {
            let items: Vec<String> = obj
                .iter()
                .map(|(k, v)| {
                    format!(
                        "{}\"{}\": {}",
                        self.indent(indent + 1),
                        self.escape_string(k),
                        self.print_value(v, indent + 1)
                    )
                })
                .collect();
            format!("{{\n{}\n{}}}", items.join(",\n"), self.indent(indent))
        } else {
            let items: Vec<String> = obj
                .iter()
                .map(|(k, v)| format!("\"{}\":{}", self.escape_string(k), self.print_value(v, indent)))
                .collect();
            format!("{{{}}}", items.join(","))
        }
    }

    fn indent(&self, level: usize) -> String {
        "  ".repeat(level)
    }

    fn escape_string(&self, s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        for c in s.chars() {
            match c {
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
                c => out.push(c),
            }
        }
        out
    }
}

/// Collects root results into one object, leaving out absent blocks.
pub fn document_value(results: &IndexMap<String, ResultValue>) -> Value {
    Value::Object(
        results
            .iter()
            .filter(|(_, result)| !result.is_absent())
            .map(|(key, result)| (key.clone(), result.clone().into_value()))
            .collect(),
    )
}

/// [`document_value`] as `serde_json` data, keys in declared order.
pub fn document_json(results: &IndexMap<String, ResultValue>) -> serde_json::Value {
    value_to_json(&document_value(results))
}

/// Converts a Value to compact JSON.
///
/// # Examples
///
/// ```
/// use gql_lang::Value;
/// use gql_lang::output::to_json;
/// use indexmap::IndexMap;
///
/// let mut row = IndexMap::new();
/// row.insert("name".to_string(), Value::String("Alice".to_string()));
/// row.insert("age".to_string(), Value::Integer(30));
///
/// assert_eq!(to_json(&Value::Object(row)), r#"{"name":"Alice","age":30}"#);
/// ```
pub fn to_json(value: &Value) -> String {
    JsonPrinter::new(false).print(value)
}

/// Converts a Value to JSON with 2-space indentation, one element per line.
pub fn to_json_pretty(value: &Value) -> String {
    JsonPrinter::new(true).print(value)
}
