//! Aggregate functions over a group's values.
//!
//! Each function is a small combiner with an accumulator: `create`, `add_input` per value,
//! then `finish`. [`AggFunc`] picks one by name and runs it over a group.
//!
//! Shared rules:
//! - Nulls are ignored by every function.
//! - `sum`, `avg` and `median` use numeric coercion and skip values that do not coerce; with
//!   nothing usable they return null.
//! - `min`/`max` compare with the mixed comparator and return the original value.

use crate::value::{Value, compare_mixed};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter, Result as FormatResult};

/// An accumulator-based aggregate.
pub trait CombineFn {
    type Acc;
    fn create(&self) -> Self::Acc;
    fn add_input(&self, acc: &mut Self::Acc, v: &Value);
    fn finish(&self, acc: Self::Acc) -> Value;
}

/// Run `comb` over `values`.
pub fn combine<'a, C: CombineFn>(comb: &C, values: impl IntoIterator<Item = &'a Value>) -> Value {
    let mut acc = comb.create();
    for v in values {
        comb.add_input(&mut acc, v);
    }
    comb.finish(acc)
}

/* ===================== Sum ===================== */

/// Integer while every usable value is an integer and the total fits; float otherwise.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sum;

#[derive(Debug)]
pub struct SumAcc {
    int_total: Option<i64>,
    float_total: f64,
    seen: bool,
}

impl CombineFn for Sum {
    type Acc = SumAcc;

    fn create(&self) -> SumAcc {
        SumAcc {
            int_total: Some(0),
            float_total: 0.0,
            seen: false,
        }
    }

    fn add_input(&self, acc: &mut SumAcc, v: &Value) {
        match v {
            Value::Int(i) => {
                acc.int_total = acc.int_total.and_then(|t| t.checked_add(*i));
                acc.float_total += *i as f64;
                acc.seen = true;
            }
            other => {
                if let Ok(x) = other.as_number() {
                    acc.int_total = None;
                    acc.float_total += x;
                    acc.seen = true;
                }
            }
        }
    }

    fn finish(&self, acc: SumAcc) -> Value {
        match (acc.seen, acc.int_total) {
            (false, _) => Value::Null,
            (true, Some(i)) => Value::Int(i),
            (true, None) => Value::Float(acc.float_total),
        }
    }
}

/* ===================== Count ===================== */

/// Number of non-null values.
#[derive(Clone, Copy, Debug, Default)]
pub struct Count;

impl CombineFn for Count {
    type Acc = i64;

    fn create(&self) -> i64 {
        0
    }

    fn add_input(&self, acc: &mut i64, v: &Value) {
        if !v.is_null() {
            *acc += 1;
        }
    }

    fn finish(&self, acc: i64) -> Value {
        Value::Int(acc)
    }
}

/* ===================== Avg ===================== */

#[derive(Clone, Copy, Debug, Default)]
pub struct Avg;

impl CombineFn for Avg {
    type Acc = (f64, u64);

    fn create(&self) -> (f64, u64) {
        (0.0, 0)
    }

    fn add_input(&self, acc: &mut (f64, u64), v: &Value) {
        if let Ok(x) = v.as_number() {
            acc.0 += x;
            acc.1 += 1;
        }
    }

    fn finish(&self, (total, n): (f64, u64)) -> Value {
        if n == 0 {
            Value::Null
        } else {
            Value::Float(total / n as f64)
        }
    }
}

/* ===================== Min / Max ===================== */

/// Keeps the first value that no later value beats under `keep`.
fn extreme(acc: &mut Option<Value>, v: &Value, keep: Ordering) {
    if v.is_null() {
        return;
    }
    let replace = match acc {
        Some(cur) => compare_mixed(v, cur) == keep,
        None => true,
    };
    if replace {
        *acc = Some(v.clone());
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Min;

impl CombineFn for Min {
    type Acc = Option<Value>;

    fn create(&self) -> Option<Value> {
        None
    }

    fn add_input(&self, acc: &mut Option<Value>, v: &Value) {
        extreme(acc, v, Ordering::Less);
    }

    fn finish(&self, acc: Option<Value>) -> Value {
        acc.unwrap_or(Value::Null)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Max;

impl CombineFn for Max {
    type Acc = Option<Value>;

    fn create(&self) -> Option<Value> {
        None
    }

    fn add_input(&self, acc: &mut Option<Value>, v: &Value) {
        extreme(acc, v, Ordering::Greater);
    }

    fn finish(&self, acc: Option<Value>) -> Value {
        acc.unwrap_or(Value::Null)
    }
}

/* ===================== Median ===================== */

/// Exact median of the numerically coercible values; even counts average the middle pair.
#[derive(Clone, Copy, Debug, Default)]
pub struct Median;

impl CombineFn for Median {
    type Acc = Vec<f64>;

    fn create(&self) -> Vec<f64> {
        Vec::new()
    }

    fn add_input(&self, acc: &mut Vec<f64>, v: &Value) {
        if let Ok(x) = v.as_number() {
            acc.push(x);
        }
    }

    fn finish(&self, mut acc: Vec<f64>) -> Value {
        if acc.is_empty() {
            return Value::Null;
        }
        acc.sort_by(f64::total_cmp);
        let mid = acc.len() / 2;
        if acc.len() % 2 == 1 {
            Value::Float(acc[mid])
        } else {
            Value::Float((acc[mid - 1] + acc[mid]) / 2.0)
        }
    }
}

/* ===================== AggFunc ===================== */

/// Aggregate function selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AggFunc {
    Sum,
    Count,
    Avg,
    Min,
    Max,
    Median,
}

impl AggFunc {
    /// Parse a function name; `average` and `mean` are aliases of `avg`.
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "sum" => Some(AggFunc::Sum),
            "count" => Some(AggFunc::Count),
            "avg" | "average" | "mean" => Some(AggFunc::Avg),
            "min" => Some(AggFunc::Min),
            "max" => Some(AggFunc::Max),
            "median" => Some(AggFunc::Median),
            _ => None,
        }
    }

    /// Canonical name, also the output column name in grouped tables.
    pub fn name(self) -> &'static str {
        match self {
            AggFunc::Sum => "sum",
            AggFunc::Count => "count",
            AggFunc::Avg => "avg",
            AggFunc::Min => "min",
            AggFunc::Max => "max",
            AggFunc::Median => "median",
        }
    }

    pub fn aggregate<'a>(self, values: impl IntoIterator<Item = &'a Value>) -> Value {
        match self {
            AggFunc::Sum => combine(&Sum, values),
            AggFunc::Count => combine(&Count, values),
            AggFunc::Avg => combine(&Avg, values),
            AggFunc::Min => combine(&Min, values),
            AggFunc::Max => combine(&Max, values),
            AggFunc::Median => combine(&Median, values),
        }
    }
}

impl Display for AggFunc {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vals() -> Vec<Value> {
        vec![
            Value::Int(4),
            Value::Null,
            Value::from("x"),
            Value::Int(1),
            Value::from("10"),
        ]
    }

    #[test]
    fn sum_keeps_integers_when_possible() {
        assert_eq!(AggFunc::Sum.aggregate(&[Value::Int(10), Value::Int(30)]), Value::Int(40));
        assert_eq!(AggFunc::Sum.aggregate(&vals()), Value::Float(15.0));
        assert_eq!(AggFunc::Sum.aggregate(&[Value::Null, Value::from("a")]), Value::Null);
    }

    #[test]
    fn count_skips_nulls() {
        assert_eq!(AggFunc::Count.aggregate(&vals()), Value::Int(4));
    }

    #[test]
    fn avg_and_median() {
        assert_eq!(AggFunc::Avg.aggregate(&vals()), Value::Float(5.0));
        assert_eq!(AggFunc::Median.aggregate(&vals()), Value::Float(4.0));
        assert_eq!(
            AggFunc::Median.aggregate(&[
                Value::Int(1),
                Value::Int(2),
                Value::Int(3),
                Value::Int(10)
            ]),
            Value::Float(2.5)
        );
        assert_eq!(AggFunc::Avg.aggregate(&[]), Value::Null);
    }

    #[test]
    fn min_max_return_original_values() {
        assert_eq!(AggFunc::Min.aggregate(&vals()), Value::Int(1));
        // Text sorts after numbers.
        assert_eq!(AggFunc::Max.aggregate(&vals()), Value::from("x"));
        assert_eq!(AggFunc::Min.aggregate(&[Value::Null]), Value::Null);
    }

    #[test]
    fn aliases() {
        assert_eq!(AggFunc::parse("Mean"), Some(AggFunc::Avg));
        assert_eq!(AggFunc::parse("average"), Some(AggFunc::Avg));
        assert_eq!(AggFunc::parse("stddev"), None);
    }
}
