use indexmap::IndexMap;
use std::fmt;

/// A value flowing through the GQL pipeline.
///
/// Table cells, macro values, filter literals and assembled results all share
/// this type. Integers and floats are kept apart so that `7 // 2` stays `3`
/// instead of drifting into `3.0`.
///
/// # Examples
///
/// ```
/// use gql_lang::Value;
/// use indexmap::IndexMap;
///
/// let count = Value::Integer(42);
/// let title = Value::String("Movie A".to_string());
///
/// let mut row = IndexMap::new();
/// row.insert("name".to_string(), title);
/// row.insert("count".to_string(), count);
/// let object = Value::Object(row);
/// assert!(matches!(object, Value::Object(_)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing cell
    Null,
    /// Boolean cell (JSON sources only)
    Boolean(bool),
    /// Floating-point number
    Float(f64),
    /// Integer number (preserved separately from floats)
    Integer(i64),
    /// UTF-8 string
    String(String),
    /// Interval literal such as `[50, 100)`
    Range(Range),
    /// Membership literal such as `{"India", "USA"}`
    Set(SetLiteral),
    /// Ordered sequence (nested results, plucked values)
    Array(Vec<Value>),
    /// Row object, keys in declared order
    Object(IndexMap<String, Value>),
}

/// An interval with independently inclusive or exclusive ends.
///
/// | literal   | lower | upper |
/// |-----------|-------|-------|
/// | `[a, b]`  | incl. | incl. |
/// | `(a, b)`  | excl. | excl. |
/// | `[a, b)`  | incl. | excl. |
/// | `(a, b]`  | excl. | incl. |
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub lower: f64,
    pub upper: f64,
    pub lower_inclusive: bool,
    pub upper_inclusive: bool,
}

impl Range {
    pub fn new(lower: f64, upper: f64, lower_inclusive: bool, upper_inclusive: bool) -> Self {
        Range {
            lower,
            upper,
            lower_inclusive,
            upper_inclusive,
        }
    }

    pub fn contains(&self, n: f64) -> bool {
        let above = if self.lower_inclusive {
            n >= self.lower
        } else {
            n > self.lower
        };
        let below = if self.upper_inclusive {
            n <= self.upper
        } else {
            n < self.upper
        };
        above && below
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.lower_inclusive { '[' } else { '(' };
        let close = if self.upper_inclusive { ']' } else { ')' };
        write!(
            f,
            "{}{}, {}{}",
            open,
            format_number(self.lower),
            format_number(self.upper),
            close
        )
    }
}

/// An unordered collection of scalar literals used for membership tests.
///
/// Duplicates collapse on insert; iteration follows first-seen order so
/// that debug output stays reproducible. Membership between sets is strict
/// (`"1"` and `1` are different members), while [`SetLiteral::contains`]
/// matches row cells loosely.
#[derive(Debug, Clone, Default)]
pub struct SetLiteral {
    items: Vec<Value>,
}

impl SetLiteral {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        let mut set = SetLiteral::new();
        for v in values {
            set.insert(v);
        }
        set
    }

    pub fn insert(&mut self, value: Value) {
        if !self.has_member(&value) {
            self.items.push(value);
        }
    }

    /// Loose membership, for testing row cells against the set
    pub fn contains(&self, value: &Value) -> bool {
        self.items.iter().any(|item| item.loose_eq(value))
    }

    fn has_member(&self, value: &Value) -> bool {
        self.items.iter().any(|item| item.same_member(value))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn union(&self, other: &SetLiteral) -> SetLiteral {
        SetLiteral::from_values(self.items.iter().chain(other.items.iter()).cloned())
    }

    pub fn intersection(&self, other: &SetLiteral) -> SetLiteral {
        SetLiteral::from_values(self.items.iter().filter(|v| other.has_member(v)).cloned())
    }

    pub fn difference(&self, other: &SetLiteral) -> SetLiteral {
        SetLiteral::from_values(self.items.iter().filter(|v| !other.has_member(v)).cloned())
    }

    pub fn symmetric_difference(&self, other: &SetLiteral) -> SetLiteral {
        self.difference(other).union(&other.difference(self))
    }
}

// Order-insensitive: two sets are equal when they hold the same members.
impl PartialEq for SetLiteral {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.items.iter().all(|v| other.has_member(v))
    }
}

impl Value {
    /// Numeric view of the value. Strings that look like numbers count,
    /// since CSV sources hand everything over as text.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Boolean(_) | Value::Integer(_) | Value::Float(_) | Value::String(_)
        )
    }

    /// Get as string (used for the string fallback of loose comparison)
    pub fn as_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Float(n) => format_number(*n),
            Value::Integer(n) => n.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Null => "null".to_string(),
            other => other.to_string(),
        }
    }

    /// Dual-type equality used by row predicates.
    ///
    /// Values of the same kind compare directly. When the kinds disagree
    /// (`"50"` against `50`), both sides are coerced to numbers first and
    /// only if that fails are their string forms compared.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (a, b) if a.is_scalar() && b.is_scalar() => {
                match (a.as_number(), b.as_number()) {
                    (Some(x), Some(y)) => x == y,
                    _ => a.as_string() == b.as_string(),
                }
            }
            (a, b) => a == b,
        }
    }

    /// Set identity: same kind and value, except that integers and floats
    /// compare numerically (`1` and `1.0` are one member).
    fn same_member(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => *a as f64 == *b,
            (a, b) => a == b,
        }
    }

    /// Returns a human-readable type name
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Range(_) => "range",
            Value::Set(_) => "set",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Range(r) => write!(f, "{}", r),
            Value::Set(s) => {
                let items: Vec<String> = s.iter().map(|v| v.to_string()).collect();
                write!(f, "{{{}}}", items.join(", "))
            }
            Value::Array(items) => {
                let items: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Value::Object(map) => {
                let items: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{:?}: {}", k, v))
                    .collect();
                write!(f, "{{{}}}", items.join(", "))
            }
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// Formats a float so whole values keep their `.0` and stay visibly
/// distinct from integers.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        format!("{:.1}", n)
    } else {
        n.to_string()
    }
}
