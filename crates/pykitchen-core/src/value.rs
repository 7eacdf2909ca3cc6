//! Runtime values that ingredients hold and tools produce.
//!
//! Values form a closed set of semantic types mirroring the Python built-in
//! types the game teaches. Equality between values is exact and structural:
//! lists compare element-wise, dicts key-wise, and values of different types
//! are never equal (`4` is not `"4"`, `True` is not `1`).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Semantic type tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Whole number.
    Int,
    /// Text.
    Str,
    /// Ordered sequence of values.
    List,
    /// Truth value.
    Bool,
    /// String-keyed mapping.
    Dict,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Str => write!(f, "str"),
            Self::List => write!(f, "list"),
            Self::Bool => write!(f, "bool"),
            Self::Dict => write!(f, "dict"),
        }
    }
}

/// A runtime value.
///
/// Serialized as plain JSON (`10`, `"Alice"`, `[5, 10]`, `true`, `{"a": 1}`).
/// The derived `PartialEq` is the deep equality used to verify orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Whole number.
    Int(i64),
    /// Text.
    Str(String),
    /// Truth value.
    Bool(bool),
    /// Ordered sequence of values.
    List(Vec<Value>),
    /// String-keyed mapping.
    Dict(BTreeMap<String, Value>),
}

impl Value {
    /// Returns the semantic type of this value.
    #[must_use]
    pub const fn value_type(&self) -> ValueType {
        match self {
            Self::Int(_) => ValueType::Int,
            Self::Str(_) => ValueType::Str,
            Self::Bool(_) => ValueType::Bool,
            Self::List(_) => ValueType::List,
            Self::Dict(_) => ValueType::Dict,
        }
    }

    /// Returns the elements if this value is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Convenience constructor for a list of integers.
    #[must_use]
    pub fn int_list(items: impl IntoIterator<Item = i64>) -> Self {
        Self::List(items.into_iter().map(Self::Int).collect())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<Self>> for Value {
    fn from(items: Vec<Self>) -> Self {
        Self::List(items)
    }
}

/// Renders the value as a Python literal.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "\"{s}\""),
            Self::Bool(true) => write!(f, "True"),
            Self::Bool(false) => write!(f, "False"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Dict(map) => {
                write!(f, "{{")?;
                for (i, (key, item)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{key}\": {item}")?;
                }
                write!(f, "}}")
            }
        }
    }
}
