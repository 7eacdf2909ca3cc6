//! The closed set of tool functions.
//!
//! Each [`Builtin`] is a pure function over [`Value`]s. Catalog files name a
//! builtin to attach behaviour to a tool; there is no way to register new
//! functions at runtime.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Error raised by a tool function when it rejects its runtime inputs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ToolError {
    /// Human-readable reason.
    pub message: String,
}

impl ToolError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Identifier of a built-in tool function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Builtin {
    /// `add(a, b)`: integer addition or string concatenation.
    Add,
    /// `sum(iterable)`: total of a list of integers.
    Sum,
    /// `len(obj)`: number of elements or characters.
    Len,
    /// `max(iterable)`: largest element of a list.
    Max,
    /// `get_first(lst)`: element at index 0.
    GetFirst,
}

impl Builtin {
    /// Number of positional arguments the function takes.
    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::Add => 2,
            Self::Sum | Self::Len | Self::Max | Self::GetFirst => 1,
        }
    }

    /// Invokes the function with positional arguments.
    pub fn call(self, args: &[&Value]) -> Result<Value, ToolError> {
        if args.len() != self.arity() {
            return Err(ToolError::new(format!(
                "{self}() expects {} arguments, got {}",
                self.arity(),
                args.len()
            )));
        }

        match self {
            Self::Add => add(args[0], args[1]),
            Self::Sum => sum(args[0]),
            Self::Len => len(args[0]),
            Self::Max => max(args[0]),
            Self::GetFirst => get_first(args[0]),
        }
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Add => "add",
            Self::Sum => "sum",
            Self::Len => "len",
            Self::Max => "max",
            Self::GetFirst => "get_first",
        };
        write!(f, "{name}")
    }
}

fn add(a: &Value, b: &Value) -> Result<Value, ToolError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x
            .checked_add(*y)
            .map(Value::Int)
            .ok_or_else(|| ToolError::new("integer overflow")),
        (Value::Str(x), Value::Str(y)) => Ok(Value::Str(format!("{x}{y}"))),
        _ => Err(ToolError::new(format!(
            "unsupported operand types for add: '{}' and '{}'",
            a.value_type(),
            b.value_type()
        ))),
    }
}

fn expect_list(value: &Value) -> Result<&[Value], ToolError> {
    value
        .as_list()
        .ok_or_else(|| ToolError::new("argument must be a list"))
}

fn sum(value: &Value) -> Result<Value, ToolError> {
    let mut total: i64 = 0;
    for item in expect_list(value)? {
        let Value::Int(n) = item else {
            return Err(ToolError::new(format!(
                "sum() cannot add an element of type '{}'",
                item.value_type()
            )));
        };
        total = total
            .checked_add(*n)
            .ok_or_else(|| ToolError::new("integer overflow"))?;
    }
    Ok(Value::Int(total))
}

fn len(value: &Value) -> Result<Value, ToolError> {
    let count = match value {
        Value::List(items) => items.len(),
        Value::Str(s) => s.chars().count(),
        Value::Dict(map) => map.len(),
        other => {
            return Err(ToolError::new(format!(
                "object of type '{}' has no len()",
                other.value_type()
            )));
        }
    };
    i64::try_from(count)
        .map(Value::Int)
        .map_err(|_| ToolError::new("length does not fit in an int"))
}

fn max(value: &Value) -> Result<Value, ToolError> {
    let items = expect_list(value)?;
    let Some(first) = items.first() else {
        return Err(ToolError::new("list is empty"));
    };

    match first {
        Value::Int(_) => {
            let mut best = i64::MIN;
            for item in items {
                let Value::Int(n) = item else {
                    return Err(mixed_elements());
                };
                best = best.max(*n);
            }
            Ok(Value::Int(best))
        }
        Value::Str(_) => {
            let mut best: Option<&String> = None;
            for item in items {
                let Value::Str(s) = item else {
                    return Err(mixed_elements());
                };
                if best.map_or(true, |b| s > b) {
                    best = Some(s);
                }
            }
            Ok(Value::Str(best.cloned().unwrap_or_default()))
        }
        other => Err(ToolError::new(format!(
            "max() cannot compare elements of type '{}'",
            other.value_type()
        ))),
    }
}

fn mixed_elements() -> ToolError {
    ToolError::new("max() cannot compare elements of different types")
}

fn get_first(value: &Value) -> Result<Value, ToolError> {
    value
        .as_list()
        .and_then(<[Value]>::first)
        .cloned()
        .ok_or_else(|| ToolError::new("list is empty or not a list"))
}
