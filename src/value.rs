//! Scalar row values and the mixed comparator shared by filters, ordering and aggregates.
//!
//! Two coercion rules drive almost every operator:
//! - [`Value::as_number`] coerces to `f64` (integers, floats, booleans as 1/0, numeric text).
//! - [`Value::to_text`] renders the value for string fallback comparisons.
//!
//! [`SortKey`] combines them into one total order: coercible values first (numerically), then
//! everything else by text. Nulls sort as the empty string.

use crate::error::RowEvalError;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter, Result as FormatResult};

/// A scalar cell value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// The type tag the inferrer assigns to a token or a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Null,
    Boolean,
    Integer,
    Float,
    /// Date-shaped text. The value stays a string; this is only a tag.
    Date,
    String,
}

impl Kind {
    pub fn name(self) -> &'static str {
        match self {
            Kind::Null => "null",
            Kind::Boolean => "boolean",
            Kind::Integer => "integer",
            Kind::Float => "float",
            Kind::Date => "date",
            Kind::String => "string",
        }
    }
}

impl Display for Kind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        f.write_str(self.name())
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Boolean,
            Value::Int(_) => Kind::Integer,
            Value::Float(_) => Kind::Float,
            Value::Str(_) => Kind::String,
        }
    }

    /// Numeric coercion used by comparisons and aggregates.
    ///
    /// # Errors
    /// [`RowEvalError::Null`] for nulls, [`RowEvalError::NotNumeric`] for text that does not
    /// parse as a number.
    pub fn as_number(&self) -> Result<f64, RowEvalError> {
        match self {
            Value::Null => Err(RowEvalError::Null),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Ok(*i as f64),
            Value::Float(x) => Ok(*x),
            Value::Str(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| RowEvalError::NotNumeric(s.clone())),
        }
    }

    /// Text rendering for string comparisons. Nulls render as the empty string.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Sort key produced by numeric coercion with string fallback.
///
/// The derived order puts every `Number` before every `Text`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortKey {
    Number(OrderedFloat<f64>),
    Text(String),
}

impl SortKey {
    pub fn of(v: &Value) -> Self {
        match v.as_number() {
            Ok(x) => SortKey::Number(OrderedFloat(x)),
            Err(_) => SortKey::Text(v.to_text()),
        }
    }
}

/// Hashable identity of a value, used for group and join buckets.
///
/// Numeric values share one identity with `==`: booleans hash as `1`/`0` and integral floats
/// as integers, so `true`, `1` and `1.0` land in the same bucket.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum HashKey {
    Null,
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
}

impl HashKey {
    pub fn of(v: &Value) -> Self {
        match v {
            Value::Null => HashKey::Null,
            Value::Bool(b) => HashKey::Int(i64::from(*b)),
            Value::Int(i) => HashKey::Int(*i),
            Value::Float(x) if x.fract() == 0.0 && x.abs() < 9.0e15 => HashKey::Int(*x as i64),
            Value::Float(x) => HashKey::Float(OrderedFloat(*x)),
            Value::Str(s) => HashKey::Str(s.clone()),
        }
    }
}

/// Compare two values with the mixed comparator.
pub fn compare_mixed(a: &Value, b: &Value) -> Ordering {
    SortKey::of(a).cmp(&SortKey::of(b))
}

/// Comparison operators accepted by filters and having clauses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    /// Case-insensitive substring match on the text rendering.
    Contains,
}

impl Comparison {
    /// Parse an operator token such as `">="` or `"contains"`.
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim() {
            "==" | "=" => Some(Comparison::Eq),
            "!=" | "<>" => Some(Comparison::Ne),
            ">" => Some(Comparison::Gt),
            "<" => Some(Comparison::Lt),
            ">=" => Some(Comparison::Ge),
            "<=" => Some(Comparison::Le),
            t if t.eq_ignore_ascii_case("contains") => Some(Comparison::Contains),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
            Comparison::Gt => ">",
            Comparison::Lt => "<",
            Comparison::Ge => ">=",
            Comparison::Le => "<=",
            Comparison::Contains => "contains",
        }
    }

    /// Evaluate `lhs <op> rhs` for one row.
    ///
    /// Ordering operators need both sides numeric; equality falls back to text when either
    /// side is not numeric.
    ///
    /// # Errors
    /// Returns the coercion failure for ordering operators; callers exclude the row.
    pub fn evaluate(self, lhs: &Value, rhs: &Value) -> Result<bool, RowEvalError> {
        match self {
            Comparison::Eq | Comparison::Ne => {
                let equal = match (lhs.as_number(), rhs.as_number()) {
                    (Ok(a), Ok(b)) => a == b,
                    _ => lhs.to_text() == rhs.to_text(),
                };
                Ok(equal == (self == Comparison::Eq))
            }
            Comparison::Contains => Ok(lhs
                .to_text()
                .to_lowercase()
                .contains(&rhs.to_text().to_lowercase())),
            Comparison::Gt | Comparison::Lt | Comparison::Ge | Comparison::Le => {
                let a = lhs.as_number()?;
                let b = rhs.as_number()?;
                Ok(match self {
                    Comparison::Gt => a > b,
                    Comparison::Lt => a < b,
                    Comparison::Ge => a >= b,
                    _ => a <= b,
                })
            }
        }
    }
}

impl Display for Comparison {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        f.write_str(self.symbol())
    }
}
