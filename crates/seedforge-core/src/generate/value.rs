use chrono::{NaiveDate, NaiveDateTime};

use crate::patterns::USER_VARIABLE;

/// A generated value for a database column.
///
/// The set is closed: every value that travels from generation to emission is
/// one of these tags, and the emitter quotes per tag. `Decimal` keeps the
/// rendered text so precision/scale survive untouched. `Var` is a MySQL user
/// variable reference (`@last_...`) emitted verbatim so children can bind to
/// `LAST_INSERT_ID()` captures.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Decimal(String),
    Str(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    SetLiteral(String),
    Var(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for `@name` references that the emitter must not quote.
    pub fn is_variable(&self) -> bool {
        match self {
            Value::Var(s) => USER_VARIABLE.is_match(s),
            _ => false,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Stable string form used as a hash key when tracking uniqueness of
    /// single values and value tuples.
    pub fn unique_key(&self) -> String {
        match self {
            Value::Null => "__NULL__".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format!("{:.10}", f),
            Value::Decimal(s) => s.clone(),
            Value::Str(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Value::SetLiteral(s) => s.clone(),
            Value::Var(s) => s.clone(),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::Decimal(s) => write!(f, "{}", s),
            Value::Str(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Value::SetLiteral(s) => write!(f, "{}", s),
            Value::Var(s) => write!(f, "{}", s),
        }
    }
}

/// Join a tuple of values into one uniqueness-tracking key.
pub fn tuple_key(values: &[&Value]) -> String {
    values
        .iter()
        .map(|v| v.unique_key())
        .collect::<Vec<_>>()
        .join("|")
}
