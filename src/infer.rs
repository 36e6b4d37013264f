//! Token and column type inference.
//!
//! [`infer_type`] classifies a single raw token with ordered checks, first match wins:
//! null, boolean, integer, float, date, string. Booleans are checked before numbers, so the
//! tokens `"1"` and `"0"` are always booleans.
//!
//! [`infer_column_types`] samples the head of a table and assigns each column its most
//! frequent non-null kind.

use crate::value::{Kind, Value};

/// Rows examined per column by [`infer_column_types`].
pub const SAMPLE_ROWS: usize = 100;
/// Non-empty values collected per column by [`infer_column_types`].
pub const SAMPLE_VALUES: usize = 10;

const NULL_TOKENS: [&str; 4] = ["null", "na", "n/a", "none"];
const TRUE_TOKENS: [&str; 5] = ["true", "t", "yes", "y", "1"];
const FALSE_TOKENS: [&str; 5] = ["false", "f", "no", "n", "0"];

/// Classify a raw token and convert it to a value of that kind.
///
/// Date-shaped tokens keep their original text; the kind is a tag only.
pub fn infer_type(token: &str) -> (Value, Kind) {
    let t = token.trim();
    if is_null_token(t) {
        return (Value::Null, Kind::Null);
    }
    if let Some(b) = parse_bool(t) {
        return (Value::Bool(b), Kind::Boolean);
    }
    if let Ok(i) = t.parse::<i64>() {
        return (Value::Int(i), Kind::Integer);
    }
    if let Some(x) = parse_float_literal(t) {
        return (Value::Float(x), Kind::Float);
    }
    if looks_like_date(t) {
        return (Value::Str(t.to_string()), Kind::Date);
    }
    (Value::Str(t.to_string()), Kind::String)
}

/// Convert a raw token using a column's inferred kind.
///
/// Tokens that do not fit the column kind fall back to [`infer_type`] on their own.
pub fn convert_token(token: &str, kind: Kind) -> Value {
    let t = token.trim();
    if is_null_token(t) {
        return Value::Null;
    }
    let fitted = match kind {
        Kind::Boolean => parse_bool(t).map(Value::Bool),
        Kind::Integer => t.parse::<i64>().ok().map(Value::Int),
        Kind::Float => t.parse::<f64>().ok().map(Value::Float),
        Kind::Date | Kind::String => Some(Value::Str(t.to_string())),
        Kind::Null => None,
    };
    fitted.unwrap_or_else(|| infer_type(t).0)
}

/// Infer one kind per column from the head of `rows`.
///
/// For each column, at most [`SAMPLE_ROWS`] rows are scanned and at most [`SAMPLE_VALUES`]
/// non-empty values collected. The most frequent non-null kind wins; ties go to the kind seen
/// first. A column with no usable sample is a string column.
pub fn infer_column_types<S: AsRef<str>>(rows: &[Vec<S>], columns: &[String]) -> Vec<Kind> {
    (0..columns.len())
        .map(|col| {
            let samples = rows
                .iter()
                .take(SAMPLE_ROWS)
                .filter_map(|row| row.get(col))
                .map(AsRef::as_ref)
                .filter(|s| !s.is_empty())
                .take(SAMPLE_VALUES);
            majority_kind(samples.map(|s| infer_type(s).1))
        })
        .collect()
}

/// Most frequent non-null kind, first-encountered on ties, [`Kind::String`] when empty.
pub(crate) fn majority_kind(kinds: impl Iterator<Item = Kind>) -> Kind {
    let mut tally: Vec<(Kind, usize)> = Vec::new();
    for k in kinds.filter(|k| *k != Kind::Null) {
        match tally.iter_mut().find(|(seen, _)| *seen == k) {
            Some((_, n)) => *n += 1,
            None => tally.push((k, 1)),
        }
    }
    // max_by_key keeps the last maximum; fold keeps the first.
    tally
        .into_iter()
        .fold(None, |best: Option<(Kind, usize)>, (k, n)| match best {
            Some((_, m)) if m >= n => best,
            _ => Some((k, n)),
        })
        .map_or(Kind::String, |(k, _)| k)
}

/// True when `token` parses as a number (any float syntax). Used by header detection.
pub fn is_numeric(token: &str) -> bool {
    token.trim().parse::<f64>().is_ok()
}

fn is_null_token(t: &str) -> bool {
    t.is_empty() || NULL_TOKENS.iter().any(|n| t.eq_ignore_ascii_case(n))
}

fn parse_bool(t: &str) -> Option<bool> {
    if TRUE_TOKENS.iter().any(|b| t.eq_ignore_ascii_case(b)) {
        Some(true)
    } else if FALSE_TOKENS.iter().any(|b| t.eq_ignore_ascii_case(b)) {
        Some(false)
    } else {
        None
    }
}

/// A float literal must spell out a fraction or exponent; `"123"` is never a float here.
fn parse_float_literal(t: &str) -> Option<f64> {
    if !t.contains(['.', 'e', 'E']) {
        return None;
    }
    t.parse::<f64>().ok()
}

/// Shallow date heuristic: three `-` or `/` separated parts whose leading token is a
/// non-negative integer, at least one of them positive.
fn looks_like_date(t: &str) -> bool {
    if !t.contains(['-', '/']) {
        return false;
    }
    let normalized = t.replace('-', "/");
    let parts: Vec<&str> = normalized.split('/').collect();
    if parts.len() != 3 {
        return false;
    }
    let mut nums = Vec::with_capacity(3);
    for p in parts {
        match p.split_whitespace().next().map(str::parse::<u64>) {
            Some(Ok(n)) => nums.push(n),
            _ => return false,
        }
    }
    nums.iter().any(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_check_precedes_numeric() {
        assert_eq!(infer_type("1"), (Value::Bool(true), Kind::Boolean));
        assert_eq!(infer_type("0"), (Value::Bool(false), Kind::Boolean));
        assert_eq!(infer_type("YES").1, Kind::Boolean);
    }

    #[test]
    fn integer_versus_float() {
        assert_eq!(infer_type("123"), (Value::Int(123), Kind::Integer));
        assert_eq!(infer_type("123.0"), (Value::Float(123.0), Kind::Float));
        assert_eq!(infer_type("1e3"), (Value::Float(1000.0), Kind::Float));
        assert_eq!(infer_type("-7"), (Value::Int(-7), Kind::Integer));
    }

    #[test]
    fn null_tokens() {
        for t in ["", "NULL", "na", "N/A", "None", "   "] {
            assert_eq!(infer_type(t).1, Kind::Null, "token {t:?}");
        }
    }

    #[test]
    fn dates_stay_strings() {
        assert_eq!(
            infer_type("2024-01-15"),
            (Value::Str("2024-01-15".into()), Kind::Date)
        );
        assert_eq!(infer_type("01/15/2024").1, Kind::Date);
        assert_eq!(infer_type("2024-01-15 10:30:00").1, Kind::Date);
        assert_eq!(infer_type("0-0-0").1, Kind::String);
        assert_eq!(infer_type("a-b-c").1, Kind::String);
        assert_eq!(infer_type("1-2").1, Kind::String);
    }

    #[test]
    fn column_majority_with_first_seen_tiebreak() {
        let columns = vec!["id".to_string(), "mixed".to_string(), "empty".to_string()];
        let rows = vec![
            vec!["1", "x", ""],
            vec!["2", "5", ""],
            vec!["3", "y", ""],
            vec!["4", "6", ""],
        ];
        let kinds = infer_column_types(&rows, &columns);
        // id: boolean, integer, integer, integer
        assert_eq!(kinds, vec![Kind::Integer, Kind::String, Kind::String]);
    }

    #[test]
    fn convert_uses_column_kind() {
        assert_eq!(convert_token("1", Kind::Integer), Value::Int(1));
        assert_eq!(convert_token("3", Kind::Float), Value::Float(3.0));
        assert_eq!(convert_token("oops", Kind::Integer), Value::Str("oops".into()));
        assert_eq!(convert_token("n/a", Kind::String), Value::Null);
    }
}
