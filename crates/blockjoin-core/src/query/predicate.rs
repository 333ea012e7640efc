//! Conjunctive predicates and their decomposition.

use std::fmt;

use super::{Constant, DistinctValues, Scan, Term};
use crate::catalog::Schema;
use crate::error::Error;

/// A conjunction of terms. The empty predicate is always true.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Predicate {
    terms: Vec<Term>,
}

impl Predicate {
    /// The empty (always true) predicate.
    pub fn new() -> Self {
        Self::default()
    }

    /// A predicate of one term.
    pub fn from_term(term: Term) -> Self {
        Self { terms: vec![term] }
    }

    /// Add a term, builder style.
    pub fn with_term(mut self, term: Term) -> Self {
        self.terms.push(term);
        self
    }

    /// Terms in insertion order.
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Whether the predicate has no terms.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Whether the current row of `scan` satisfies every term.
    pub fn is_satisfied(&self, scan: &dyn Scan) -> Result<bool, Error> {
        for term in &self.terms {
            if !term.is_satisfied(scan)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Combined reduction factor: the saturating product of the terms'.
    pub fn reduction_factor(&self, plan: &dyn DistinctValues) -> u64 {
        self.terms
            .iter()
            .fold(1u64, |acc, t| acc.saturating_mul(t.reduction_factor(plan)))
    }

    /// Terms that apply entirely within `schema` and read at least one of
    /// its fields.
    pub fn select_sub_pred(&self, schema: &Schema) -> Option<Predicate> {
        let terms: Vec<Term> = self
            .terms
            .iter()
            .filter(|t| t.references_field() && t.applies_to(schema))
            .cloned()
            .collect();
        Self::non_empty(terms)
    }

    /// Terms that need both schemas: they apply to the union but to
    /// neither schema alone.
    pub fn join_sub_pred(&self, lhs: &Schema, rhs: &Schema) -> Option<Predicate> {
        let mut union = lhs.clone();
        union.add_all(rhs);
        let terms: Vec<Term> = self
            .terms
            .iter()
            .filter(|t| t.applies_to(&union) && !t.applies_to(lhs) && !t.applies_to(rhs))
            .cloned()
            .collect();
        Self::non_empty(terms)
    }

    /// Terms comparing two constants. They belong to no table.
    pub fn constant_sub_pred(&self) -> Option<Predicate> {
        let terms: Vec<Term> = self
            .terms
            .iter()
            .filter(|t| !t.references_field())
            .cloned()
            .collect();
        Self::non_empty(terms)
    }

    /// The first constant `field` is equated with.
    pub fn equates_with_constant(&self, field: &str) -> Option<&Constant> {
        self.terms.iter().find_map(|t| t.equates_with_constant(field))
    }

    /// The first field `field` is equated with.
    pub fn equates_with_field(&self, field: &str) -> Option<&str> {
        self.terms.iter().find_map(|t| t.equates_with_field(field))
    }

    /// The predicate without the term at `index`.
    pub fn without_term(&self, index: usize) -> Predicate {
        let terms = self
            .terms
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, t)| t.clone())
            .collect();
        Predicate { terms }
    }

    /// Position and constant of the first term equating `field` with a constant.
    pub fn constant_equality(&self, field: &str) -> Option<(usize, &Constant)> {
        self.terms
            .iter()
            .enumerate()
            .find_map(|(i, t)| t.equates_with_constant(field).map(|c| (i, c)))
    }

    fn non_empty(terms: Vec<Term>) -> Option<Predicate> {
        if terms.is_empty() {
            None
        } else {
            Some(Predicate { terms })
        }
    }
}

impl From<Term> for Predicate {
    fn from(term: Term) -> Self {
        Self::from_term(term)
    }
}

impl FromIterator<Term> for Predicate {
    fn from_iter<I: IntoIterator<Item = Term>>(iter: I) -> Self {
        Self {
            terms: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " and ")?;
            }
            write!(f, "{}", term)?;
        }
        Ok(())
    }
}
