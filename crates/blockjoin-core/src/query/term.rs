//! A single comparison between two expressions.

use std::fmt;

use super::{Constant, Expression, Scan};
use crate::catalog::Schema;
use crate::error::Error;

/// Reduction factor of a term that no row can satisfy.
pub const UNSATISFIABLE: u64 = u64::MAX;

/// Source of per-field distinct-value estimates, implemented by plans.
pub trait DistinctValues {
    /// Estimated number of distinct values `field` takes.
    fn distinct_values(&self, field: &str) -> u64;
}

/// Comparison operator of a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    /// `lhs = rhs`
    Equal,
    /// `lhs < rhs`
    LessThan,
}

impl Comparator {
    /// Apply the comparison to two values.
    pub fn compare(&self, lhs: &Constant, rhs: &Constant) -> bool {
        match self {
            Comparator::Equal => lhs == rhs,
            Comparator::LessThan => lhs < rhs,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Comparator::Equal => "=",
            Comparator::LessThan => "<",
        }
    }
}

/// A comparison `lhs op rhs`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Term {
    lhs: Expression,
    rhs: Expression,
    op: Comparator,
}

impl Term {
    /// Create a term.
    pub fn new(lhs: Expression, op: Comparator, rhs: Expression) -> Self {
        Self { lhs, rhs, op }
    }

    /// `lhs = rhs`
    pub fn equal(lhs: Expression, rhs: Expression) -> Self {
        Self::new(lhs, Comparator::Equal, rhs)
    }

    /// `lhs < rhs`
    pub fn less_than(lhs: Expression, rhs: Expression) -> Self {
        Self::new(lhs, Comparator::LessThan, rhs)
    }

    /// Left operand.
    pub fn lhs(&self) -> &Expression {
        &self.lhs
    }

    /// Right operand.
    pub fn rhs(&self) -> &Expression {
        &self.rhs
    }

    /// Comparison operator.
    pub fn comparator(&self) -> Comparator {
        self.op
    }

    /// Whether the current row of `scan` satisfies the term.
    pub fn is_satisfied(&self, scan: &dyn Scan) -> Result<bool, Error> {
        let lhs = self.lhs.evaluate(scan)?;
        let rhs = self.rhs.evaluate(scan)?;
        Ok(self.op.compare(&lhs, &rhs))
    }

    /// Factor by which the term is expected to shrink the rows of `plan`.
    ///
    /// A term between two constants is either always true (1) or never
    /// true ([`UNSATISFIABLE`]).
    pub fn reduction_factor(&self, plan: &dyn DistinctValues) -> u64 {
        let factor = match (&self.lhs, &self.rhs) {
            (Expression::Field(l), Expression::Field(r)) => {
                plan.distinct_values(l).max(plan.distinct_values(r))
            }
            (Expression::Field(f), Expression::Constant(_))
            | (Expression::Constant(_), Expression::Field(f)) => plan.distinct_values(f),
            (Expression::Constant(l), Expression::Constant(r)) => {
                if self.op.compare(l, r) {
                    1
                } else {
                    UNSATISFIABLE
                }
            }
        };
        factor.max(1)
    }

    /// The constant `field` is equated with, for terms of the form `field = c`.
    pub fn equates_with_constant(&self, field: &str) -> Option<&Constant> {
        if self.op != Comparator::Equal {
            return None;
        }
        match (&self.lhs, &self.rhs) {
            (Expression::Field(f), Expression::Constant(c))
            | (Expression::Constant(c), Expression::Field(f))
                if f == field =>
            {
                Some(c)
            }
            _ => None,
        }
    }

    /// The field `field` is equated with, for terms of the form `field = other`.
    pub fn equates_with_field(&self, field: &str) -> Option<&str> {
        if self.op != Comparator::Equal {
            return None;
        }
        match (&self.lhs, &self.rhs) {
            (Expression::Field(l), Expression::Field(r)) if l == field => Some(r.as_str()),
            (Expression::Field(l), Expression::Field(r)) if r == field => Some(l.as_str()),
            _ => None,
        }
    }

    /// Whether both operands can be evaluated over rows of this schema.
    pub fn applies_to(&self, schema: &Schema) -> bool {
        self.lhs.applies_to(schema) && self.rhs.applies_to(schema)
    }

    /// Whether at least one operand is a field reference.
    pub fn references_field(&self) -> bool {
        self.lhs.as_field().is_some() || self.rhs.as_field().is_some()
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.op.symbol(), self.rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::catalog::FieldDef;
    use crate::query::RowBuffer;

    struct Distincts(HashMap<&'static str, u64>);

    impl DistinctValues for Distincts {
        fn distinct_values(&self, field: &str) -> u64 {
            self.0.get(field).copied().unwrap_or(1)
        }
    }

    fn f(name: &str) -> Expression {
        Expression::field(name)
    }

    fn c(n: i32) -> Expression {
        Expression::constant(n)
    }

    #[test]
    fn test_is_satisfied() {
        let mut row = RowBuffer::new(vec!["a".into(), "b".into()]);
        row.push(vec![Constant::Int(3), Constant::Int(5)]);
        row.next().unwrap();

        assert!(Term::less_than(f("a"), f("b")).is_satisfied(&row).unwrap());
        assert!(!Term::less_than(f("b"), f("a")).is_satisfied(&row).unwrap());
        assert!(Term::equal(f("a"), c(3)).is_satisfied(&row).unwrap());
        assert!(!Term::equal(f("a"), f("b")).is_satisfied(&row).unwrap());
    }

    #[test]
    fn test_equates_with_constant() {
        let t = Term::equal(c(7), f("a"));
        assert_eq!(t.equates_with_constant("a"), Some(&Constant::Int(7)));
        assert_eq!(t.equates_with_constant("b"), None);
        assert_eq!(Term::equal(f("a"), f("b")).equates_with_constant("a"), None);
        assert_eq!(Term::less_than(f("a"), c(7)).equates_with_constant("a"), None);
    }

    #[test]
    fn test_equates_with_field_is_symmetric() {
        let t = Term::equal(f("a"), f("b"));
        assert_eq!(t.equates_with_field("a"), Some("b"));
        assert_eq!(t.equates_with_field("b"), Some("a"));
        assert_eq!(t.equates_with_field("c"), None);
        assert_eq!(Term::less_than(f("a"), f("b")).equates_with_field("a"), None);
        assert_eq!(Term::equal(f("a"), c(1)).equates_with_field("a"), None);
    }

    #[test]
    fn test_applies_to() {
        let schema = crate::catalog::Schema::new()
            .with_field(FieldDef::int("a"))
            .with_field(FieldDef::int("b"));
        assert!(Term::equal(f("a"), f("b")).applies_to(&schema));
        assert!(Term::equal(f("a"), c(1)).applies_to(&schema));
        assert!(!Term::equal(f("a"), f("z")).applies_to(&schema));
    }

    #[test]
    fn test_reduction_factor() {
        let plan = Distincts(HashMap::from([("a", 10), ("b", 4), ("empty", 0)]));
        // field = field takes the larger distinct count
        assert_eq!(Term::equal(f("a"), f("b")).reduction_factor(&plan), 10);
        assert_eq!(Term::less_than(f("b"), f("a")).reduction_factor(&plan), 10);
        // field = constant, either side
        assert_eq!(Term::equal(f("b"), c(1)).reduction_factor(&plan), 4);
        assert_eq!(Term::equal(c(1), f("a")).reduction_factor(&plan), 10);
        // never below 1
        assert_eq!(Term::equal(f("empty"), c(1)).reduction_factor(&plan), 1);
    }

    #[test]
    fn test_constant_terms_reduce_to_one_or_unsatisfiable() {
        let plan = Distincts(HashMap::new());
        assert_eq!(Term::equal(c(2), c(2)).reduction_factor(&plan), 1);
        assert_eq!(Term::less_than(c(1), c(2)).reduction_factor(&plan), 1);
        assert_eq!(Term::equal(c(1), c(2)).reduction_factor(&plan), UNSATISFIABLE);
        assert_eq!(Term::less_than(c(2), c(1)).reduction_factor(&plan), UNSATISFIABLE);
        assert!(!Term::equal(c(1), c(2)).references_field());
        assert!(Term::equal(c(1), f("a")).references_field());
    }

    #[test]
    fn test_display() {
        assert_eq!(Term::less_than(f("mid"), f("majorid")).to_string(), "mid < majorid");
        assert_eq!(
            Term::equal(f("majorabbr"), Expression::constant("CS")).to_string(),
            "majorabbr = 'CS'"
        );
    }
}
