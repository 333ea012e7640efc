//! Block nested loop join.
//!
//! The operands are oriented so that the cheaper tuple-at-a-time product
//! drives the loop. The inner operand is wrapped in a [`MaterializePlan`]
//! and copied whole into a temporary table; the outer operand is read in
//! chunks that fit the available buffers, and the temporary table is
//! rescanned once per chunk.

use tracing::debug;

use super::chunk::ChunkedLoopScan;
use super::product::{chunk_rows, side_distinct_values, ProductPlan};
use super::{MaterializePlan, Plan};
use crate::catalog::Schema;
use crate::error::Error;
use crate::query::{DistinctValues, Predicate, Scan};
use crate::storage::Transaction;

#[derive(Debug, Clone)]
pub struct NestedBlockJoinPlan {
    tx: Transaction,
    outer: Box<Plan>,
    inner: Box<Plan>,
    pred: Predicate,
    schema: Schema,
    swapped: bool,
}

impl NestedBlockJoinPlan {
    /// Join `lhs` and `rhs` on `pred`.
    ///
    /// The operands trade places when `product(rhs, lhs)` is strictly
    /// cheaper than `product(lhs, rhs)`.
    pub fn new(tx: &Transaction, lhs: Plan, rhs: Plan, pred: Predicate) -> Result<Self, Error> {
        let schema = Schema::join(lhs.schema(), rhs.schema())?;
        let straight = ProductPlan::cost_of(&lhs, &rhs);
        let reversed = ProductPlan::cost_of(&rhs, &lhs);
        let swapped = reversed < straight;
        let (outer, inner) = if swapped { (rhs, lhs) } else { (lhs, rhs) };
        if swapped {
            debug!(straight, reversed, "swapped block nested loop operands");
        }
        let inner = Plan::Materialize(MaterializePlan::new(tx, inner));

        Ok(Self {
            tx: tx.clone(),
            outer: Box::new(outer),
            inner: Box::new(inner),
            pred,
            schema,
            swapped,
        })
    }

    /// Whether the operands were swapped from the order given.
    pub fn swapped(&self) -> bool {
        self.swapped
    }

    /// Operand read in chunks.
    pub fn outer(&self) -> &Plan {
        &self.outer
    }

    /// The materialized operand rescanned once per chunk.
    pub fn inner(&self) -> &Plan {
        &self.inner
    }

    pub fn predicate(&self) -> &Predicate {
        &self.pred
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// `max(1, B(outer)) * B(materialized inner) + B(outer)`
    pub fn blocks_accessed(&self) -> u64 {
        let outer = self.outer.blocks_accessed();
        outer
            .max(1)
            .saturating_mul(self.inner.blocks_accessed())
            .saturating_add(outer)
    }

    pub fn records_output(&self) -> u64 {
        let product = self
            .outer
            .records_output()
            .saturating_mul(self.inner.records_output());
        product / self.pred.reduction_factor(self)
    }

    pub fn open(&self) -> Result<Box<dyn Scan>, Error> {
        let inner = self.inner.open()?;
        let outer = self.outer.open()?;
        Ok(Box::new(ChunkedLoopScan::new(
            outer,
            self.outer.schema(),
            inner,
            chunk_rows(&self.tx, self.outer.schema()),
            Some(self.pred.clone()),
        )))
    }
}

impl DistinctValues for NestedBlockJoinPlan {
    fn distinct_values(&self, field: &str) -> u64 {
        side_distinct_values(&self.outer, &self.inner, field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, FieldDef};
    use crate::plan::TablePlan;
    use crate::query::{Constant, Expression, Term};
    use crate::storage::{StorageConfig, StorageEngine};

    fn setup() -> (Transaction, Catalog) {
        let engine = StorageEngine::open(StorageConfig::temporary()).unwrap();
        let catalog = Catalog::open(engine.clone()).unwrap();
        catalog
            .create_table(
                "a",
                Schema::new()
                    .with_field(FieldDef::int("ax"))
                    .with_field(FieldDef::int("ay")),
            )
            .unwrap();
        let file = catalog.table_file("a").unwrap();
        for i in 0..100 {
            file.insert(&[Constant::Int(i), Constant::Int(i % 10)]).unwrap();
        }
        catalog
            .create_table(
                "b",
                Schema::new()
                    .with_field(FieldDef::int("by"))
                    .with_field(FieldDef::int("bz")),
            )
            .unwrap();
        let file = catalog.table_file("b").unwrap();
        for i in 0..10 {
            file.insert(&[Constant::Int(i), Constant::Int(i * 2)]).unwrap();
        }
        (engine.begin(), catalog)
    }

    fn table(tx: &Transaction, catalog: &Catalog, name: &str) -> Plan {
        Plan::Table(TablePlan::new(tx, name, catalog).unwrap())
    }

    #[test]
    fn test_inner_side_is_materialized() {
        let (tx, catalog) = setup();
        let pred = Predicate::from_term(Term::equal(
            Expression::field("ay"),
            Expression::field("by"),
        ));
        let plan = NestedBlockJoinPlan::new(
            &tx,
            table(&tx, &catalog, "a"),
            table(&tx, &catalog, "b"),
            pred,
        )
        .unwrap();

        // product(b, a) = 1 + 10 * 4 beats product(a, b) = 4 + 100 * 1
        assert!(plan.swapped());
        let Plan::Materialize(inner) = plan.inner() else {
            panic!("expected materialized inner, got {}", plan.inner().name());
        };
        assert!(matches!(inner.child(), Plan::Table(t) if t.table() == "a"));
        assert_eq!(plan.inner().blocks_accessed(), 4);
        assert_eq!(plan.blocks_accessed(), 5);

        let explain = Plan::NestedBlockJoin(plan.clone()).explain();
        assert!(explain.contains("Materialize"), "{}", explain);

        let mut scan = plan.open().unwrap();
        let mut count = 0;
        while scan.next().unwrap() {
            assert_eq!(scan.get_val("ay").unwrap(), scan.get_val("by").unwrap());
            count += 1;
        }
        assert_eq!(count, 100);
    }
}
