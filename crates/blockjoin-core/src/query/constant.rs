//! Runtime field values.

use std::fmt;

use crate::catalog::FieldType;

/// A value stored in a field or written as a literal in a predicate.
///
/// Values of different variants are never equal; ordering places every
/// integer before every string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Constant {
    /// 32-bit signed integer.
    Int(i32),
    /// UTF-8 string.
    Str(String),
}

impl Constant {
    /// Try to get as i32.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Constant::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Try to get as string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Constant::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Check whether the value can be stored in a field of the given type.
    pub fn fits(&self, field_type: FieldType) -> bool {
        match (self, field_type) {
            (Constant::Int(_), FieldType::Int) => true,
            (Constant::Str(s), FieldType::Varchar(n)) => s.chars().count() <= n as usize,
            _ => false,
        }
    }
}

impl From<i32> for Constant {
    fn from(n: i32) -> Self {
        Constant::Int(n)
    }
}

impl From<&str> for Constant {
    fn from(s: &str) -> Self {
        Constant::Str(s.to_string())
    }
}

impl From<String> for Constant {
    fn from(s: String) -> Self {
        Constant::Str(s)
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(n) => write!(f, "{}", n),
            Constant::Str(s) => write!(f, "'{}'", s),
        }
    }
}
