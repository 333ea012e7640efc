//! Term operands.

use std::fmt;

use super::{Constant, Scan};
use crate::catalog::Schema;
use crate::error::Error;

/// One side of a comparison: a field reference or a literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expression {
    /// Reference to a field by name.
    Field(String),
    /// Literal value.
    Constant(Constant),
}

impl Expression {
    /// Field reference.
    pub fn field(name: impl Into<String>) -> Self {
        Expression::Field(name.into())
    }

    /// Literal value.
    pub fn constant(value: impl Into<Constant>) -> Self {
        Expression::Constant(value.into())
    }

    /// Field name, if this is a field reference.
    pub fn as_field(&self) -> Option<&str> {
        match self {
            Expression::Field(name) => Some(name),
            Expression::Constant(_) => None,
        }
    }

    /// Evaluate against the current row of a scan.
    pub fn evaluate(&self, scan: &dyn Scan) -> Result<Constant, Error> {
        match self {
            Expression::Field(name) => scan.get_val(name),
            Expression::Constant(c) => Ok(c.clone()),
        }
    }

    /// Whether the expression can be evaluated over rows of this schema.
    pub fn applies_to(&self, schema: &Schema) -> bool {
        match self {
            Expression::Field(name) => schema.has_field(name),
            Expression::Constant(_) => true,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Field(name) => write!(f, "{}", name),
            Expression::Constant(c) => write!(f, "{}", c),
        }
    }
}
