use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::{CompareOp, Literal};

/// A runtime value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Number(f64),
    Boolean(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            // Integral numbers print without a fractional part: 3, not 3.0.
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl From<&Literal> for Value {
    fn from(lit: &Literal) -> Self {
        match lit {
            Literal::String(s) => Value::String(s.clone()),
            Literal::Number(n) => Value::Number(*n),
            Literal::Boolean(b) => Value::Boolean(*b),
        }
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

impl Value {
    pub fn as_string(&self) -> String {
        self.to_string()
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Number(_) => "number",
            Value::Boolean(_) => "boolean",
        }
    }

    /// Total truthiness: empty strings, zero, NaN and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::String(s) => !s.is_empty(),
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Boolean(b) => *b,
        }
    }

    fn numeric(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Boolean(b) => f64::from(u8::from(*b)),
            Value::String(_) => f64::NAN,
        }
    }

    /// Compares two values with loosely-typed semantics.
    ///
    /// If either side is a string, both sides compare as strings, so
    /// `5 == "5"` holds and `"10" < "9"` holds. Otherwise both sides compare
    /// as numbers, with booleans as 0 and 1. Orderings involving NaN are false.
    pub fn compare(&self, op: CompareOp, other: &Value) -> bool {
        let ordering = match (self, other) {
            (Value::String(_), _) | (_, Value::String(_)) => {
                Some(self.as_string().cmp(&other.as_string()))
            }
            _ => self.numeric().partial_cmp(&other.numeric()),
        };
        match (op, ordering) {
            (CompareOp::Eq, o) => o == Some(Ordering::Equal),
            (CompareOp::NotEq, o) => o != Some(Ordering::Equal),
            (_, None) => false,
            (CompareOp::Gt, Some(o)) => o == Ordering::Greater,
            (CompareOp::Lt, Some(o)) => o == Ordering::Less,
            (CompareOp::Ge, Some(o)) => o != Ordering::Less,
            (CompareOp::Le, Some(o)) => o != Ordering::Greater,
        }
    }
}
