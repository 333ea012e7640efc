//! Predicate algebra and the cursor interface.
//!
//! Values, expressions, terms and conjunctive predicates, together with the
//! selectivity estimates the planner derives from them.

mod constant;
mod expression;
mod predicate;
mod scan;
mod term;

pub use constant::Constant;
pub use expression::Expression;
pub use predicate::Predicate;
pub use scan::{RowBuffer, Scan};
pub use term::{Comparator, DistinctValues, Term, UNSATISFIABLE};
