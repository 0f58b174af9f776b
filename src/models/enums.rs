use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar cell value flowing through snapshots and expression evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Boolean(bool),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null, zero, empty text and false are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Integer(n) => *n != 0,
            Value::Real(f) => *f != 0.0 && !f.is_nan(),
            Value::Text(s) => !s.is_empty(),
            Value::Boolean(b) => *b,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Real(f) => Some(*f),
            _ => None,
        }
    }

    pub fn add(&self, other: &Value) -> Value {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => Value::Text(format!("{}{}", a, b)),
            (Value::Integer(a), Value::Integer(b)) => a
                .checked_add(*b)
                .map(Value::Integer)
                .unwrap_or(Value::Real(*a as f64 + *b as f64)),
            _ => self.real_op(other, |a, b| a + b),
        }
    }

    pub fn sub(&self, other: &Value) -> Value {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a
                .checked_sub(*b)
                .map(Value::Integer)
                .unwrap_or(Value::Real(*a as f64 - *b as f64)),
            _ => self.real_op(other, |a, b| a - b),
        }
    }

    pub fn mul(&self, other: &Value) -> Value {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a
                .checked_mul(*b)
                .map(Value::Integer)
                .unwrap_or(Value::Real(*a as f64 * *b as f64)),
            _ => self.real_op(other, |a, b| a * b),
        }
    }

    /// Always real division; dividing by zero yields an infinity or NaN.
    pub fn div(&self, other: &Value) -> Value {
        self.real_op(other, |a, b| a / b)
    }

    fn real_op(&self, other: &Value, op: impl Fn(f64, f64) -> f64) -> Value {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => Value::Real(op(a, b)),
            _ => Value::Null,
        }
    }

    /// Ordering between values of comparable kinds. Mixed kinds (and nulls) are
    /// not comparable and return `None`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        }
    }

    /// Equality used by the `=` operator: integers and reals compare numerically,
    /// nulls equal each other, other mixed kinds are never equal.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            _ => self.compare(other) == Some(Ordering::Equal),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Real(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

/// Classification a renderer uses to highlight a row or a whole table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowLabel {
    Kept,
    Rejected,
    /// Group id, assigned in first-seen order starting at 0.
    Group(usize),
    /// Index of the input row a joined/expanded row was copied from.
    Source(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Load,
    Expand,
    Join,
    FilterMarked,
    Filtered,
    GroupMarked,
    Grouped,
    HavingMarked,
    Result,
}

impl StepKind {
    pub fn title(&self) -> &'static str {
        match self {
            StepKind::Load => "Input tables",
            StepKind::Expand => "Expanded for cartesian product",
            StepKind::Join => "Joined table",
            StepKind::FilterMarked => "WHERE: kept and rejected rows",
            StepKind::Filtered => "WHERE: kept rows",
            StepKind::GroupMarked => "GROUP BY: rows by group",
            StepKind::Grouped => "GROUP BY: groups",
            StepKind::HavingMarked => "HAVING: kept and rejected groups",
            StepKind::Result => "Result",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_follows_native_falsiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Integer(0).is_truthy());
        assert!(!Value::Text(String::new()).is_truthy());
        assert!(Value::Text("0".into()).is_truthy());
        assert!(Value::Real(0.5).is_truthy());
    }

    #[test]
    fn integer_arithmetic_stays_integral() {
        assert_eq!(Value::Integer(2).add(&Value::Integer(3)), Value::Integer(5));
        assert_eq!(Value::Integer(2).mul(&Value::Real(1.5)), Value::Real(3.0));
        assert_eq!(Value::Integer(7).div(&Value::Integer(2)), Value::Real(3.5));
        assert_eq!(
            Value::Integer(i64::MAX).add(&Value::Integer(1)),
            Value::Real(i64::MAX as f64 + 1.0)
        );
    }

    #[test]
    fn text_concatenates_and_null_propagates() {
        assert_eq!(Value::from("ab").add(&Value::from("cd")), Value::from("abcd"));
        assert_eq!(Value::Null.sub(&Value::Integer(1)), Value::Null);
        assert_eq!(Value::from("a").sub(&Value::Integer(1)), Value::Null);
    }

    #[test]
    fn mixed_kinds_are_not_comparable() {
        assert_eq!(Value::Integer(1).compare(&Value::Real(1.0)), Some(Ordering::Equal));
        assert!(Value::Integer(1).loose_eq(&Value::Real(1.0)));
        assert_eq!(Value::Integer(1).compare(&Value::from("1")), None);
        assert!(!Value::Integer(1).loose_eq(&Value::from("1")));
    }

    #[test]
    fn reals_display_without_trailing_zero() {
        assert_eq!(Value::Real(3.0).to_string(), "3");
        assert_eq!(Value::Real(2.5).to_string(), "2.5");
        assert_eq!(Value::Null.to_string(), "NULL");
    }
}
