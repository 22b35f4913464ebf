//! Cell values and column typing.
//!
//! A `Value` is what a table cell holds. A `Key` is its normalized
//! comparison form in the context of a column kind. Keys are what
//! predicates and identifier joins hash on, while raw values keep their
//! original representation for display and persistence.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Number(f64),
    Bool(bool),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Loose truthiness for the check-off attribute.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Number(n) => *n != 0.0,
            Value::Bool(b) => *b,
            Value::Text(s) => s.eq_ignore_ascii_case("true"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Number(n) => {
                // Whole numbers render without a trailing ".0"
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Bool(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Column type, inferred once at load/import time and driving predicate
/// comparison from then on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Temporal,
    Boolean,
    Textual,
}

impl ColumnKind {
    /// Infer a column's kind from its values. Nulls carry no signal; a
    /// column of nothing but nulls is Textual. Text that merely looks
    /// numeric stays Textual; the cell type decides, not its spelling.
    pub fn infer<'a, I>(values: I) -> ColumnKind
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut saw_any = false;
        let mut all_number = true;
        let mut all_bool = true;
        let mut all_temporal = true;

        for value in values {
            match value {
                Value::Null => continue,
                Value::Number(_) => {
                    all_bool = false;
                    all_temporal = false;
                }
                Value::Bool(_) => {
                    all_number = false;
                    all_temporal = false;
                }
                Value::Text(s) => {
                    all_number = false;
                    all_bool = false;
                    if parse_timestamp(s).is_none() {
                        all_temporal = false;
                    }
                }
            }
            saw_any = true;
            if !all_number && !all_bool && !all_temporal {
                break;
            }
        }

        if !saw_any {
            ColumnKind::Textual
        } else if all_number {
            ColumnKind::Numeric
        } else if all_bool {
            ColumnKind::Boolean
        } else if all_temporal {
            ColumnKind::Temporal
        } else {
            ColumnKind::Textual
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Numeric => write!(f, "numeric"),
            ColumnKind::Temporal => write!(f, "temporal"),
            ColumnKind::Boolean => write!(f, "boolean"),
            ColumnKind::Textual => write!(f, "textual"),
        }
    }
}

/// Coerce a value to a number, if it has a numeric reading.
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        Value::Null | Value::Bool(_) => None,
    }
}

/// Coerce a value to a timestamp, if it has a temporal reading.
pub fn coerce_timestamp(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Text(s) => parse_timestamp(s),
        _ => None,
    }
}

/// Accepted timestamp spellings, tried in order. Date-only values land
/// at midnight so they compare against full timestamps.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, format) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// Normalized comparison key for a value under a column kind.
///
/// Derived from the cell's value, not its display formatting: under a
/// numeric column the text "42" and the number 42 produce the same key.
/// A cell that cannot be coerced to the column's kind falls back to its
/// string representation, which never collides with a coerced key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Null,
    Number(OrderedFloat<f64>),
    Time(NaiveDateTime),
    Text(String),
}

impl Key {
    pub fn for_kind(value: &Value, kind: ColumnKind) -> Key {
        if value.is_null() {
            return Key::Null;
        }
        match kind {
            ColumnKind::Numeric => match coerce_number(value) {
                Some(n) => Key::Number(OrderedFloat(n)),
                None => Key::Text(value.to_string()),
            },
            ColumnKind::Temporal => match coerce_timestamp(value) {
                Some(ts) => Key::Time(ts),
                None => Key::Text(value.to_string()),
            },
            ColumnKind::Boolean | ColumnKind::Textual => Key::Text(value.to_string()),
        }
    }
}
