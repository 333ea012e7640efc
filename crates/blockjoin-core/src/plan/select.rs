//! Filtering and projection.

use super::Plan;
use crate::catalog::Schema;
use crate::error::Error;
use crate::query::{Constant, Predicate, Scan};

/// Rows of the child that satisfy a predicate.
#[derive(Debug, Clone)]
pub struct SelectPlan {
    child: Box<Plan>,
    pred: Predicate,
    records: u64,
}

impl SelectPlan {
    pub fn new(child: Plan, pred: Predicate) -> Self {
        let records = child.records_output() / pred.reduction_factor(&child);
        Self {
            child: Box::new(child),
            pred,
            records,
        }
    }

    pub fn child(&self) -> &Plan {
        &self.child
    }

    pub fn predicate(&self) -> &Predicate {
        &self.pred
    }

    pub fn schema(&self) -> &Schema {
        self.child.schema()
    }

    /// Filtering reads exactly what the child reads.
    pub fn blocks_accessed(&self) -> u64 {
        self.child.blocks_accessed()
    }

    pub fn records_output(&self) -> u64 {
        self.records
    }

    pub fn distinct_values(&self, field: &str) -> u64 {
        if self.pred.equates_with_constant(field).is_some() {
            return 1;
        }
        if let Some(other) = self.pred.equates_with_field(field) {
            return self
                .child
                .distinct_values(field)
                .min(self.child.distinct_values(other));
        }
        self.child.distinct_values(field).min(self.records).max(1)
    }

    pub fn open(&self) -> Result<Box<dyn Scan>, Error> {
        Ok(Box::new(SelectScan {
            inner: self.child.open()?,
            pred: self.pred.clone(),
        }))
    }
}

/// Cursor skipping rows that fail the predicate.
pub struct SelectScan {
    inner: Box<dyn Scan>,
    pred: Predicate,
}

impl Scan for SelectScan {
    fn before_first(&mut self) -> Result<(), Error> {
        self.inner.before_first()
    }

    fn next(&mut self) -> Result<bool, Error> {
        while self.inner.next()? {
            if self.pred.is_satisfied(self.inner.as_ref())? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn get_val(&self, field: &str) -> Result<Constant, Error> {
        self.inner.get_val(field)
    }

    fn has_field(&self, field: &str) -> bool {
        self.inner.has_field(field)
    }
}

/// The child's rows restricted to a subset of fields.
#[derive(Debug, Clone)]
pub struct ProjectPlan {
    child: Box<Plan>,
    schema: Schema,
}

impl ProjectPlan {
    pub fn new(child: Plan, fields: &[String]) -> Result<Self, Error> {
        let schema = child.schema().project(fields)?;
        Ok(Self {
            child: Box::new(child),
            schema,
        })
    }

    pub fn child(&self) -> &Plan {
        &self.child
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn blocks_accessed(&self) -> u64 {
        self.child.blocks_accessed()
    }

    pub fn records_output(&self) -> u64 {
        self.child.records_output()
    }

    pub fn distinct_values(&self, field: &str) -> u64 {
        self.child.distinct_values(field)
    }

    pub fn open(&self) -> Result<Box<dyn Scan>, Error> {
        Ok(Box::new(ProjectScan {
            inner: self.child.open()?,
            schema: self.schema.clone(),
        }))
    }
}

/// Cursor hiding fields outside the projection.
pub struct ProjectScan {
    inner: Box<dyn Scan>,
    schema: Schema,
}

impl Scan for ProjectScan {
    fn before_first(&mut self) -> Result<(), Error> {
        self.inner.before_first()
    }

    fn next(&mut self) -> Result<bool, Error> {
        self.inner.next()
    }

    fn get_val(&self, field: &str) -> Result<Constant, Error> {
        if self.schema.has_field(field) {
            self.inner.get_val(field)
        } else {
            Err(Error::UnknownField(field.to_string()))
        }
    }

    fn has_field(&self, field: &str) -> bool {
        self.schema.has_field(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, FieldDef};
    use crate::plan::TablePlan;
    use crate::query::{Expression, Term};
    use crate::storage::{StorageConfig, StorageEngine};

    fn table_a() -> Plan {
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
        Plan::Table(TablePlan::new(&engine.begin(), "a", &catalog).unwrap())
    }

    #[test]
    fn test_field_constant_selection_estimate() {
        let pred = Predicate::from_term(Term::equal(
            Expression::field("ay"),
            Expression::constant(3),
        ));
        let plan = SelectPlan::new(table_a(), pred);
        assert_eq!(plan.records_output(), 10);
        assert_eq!(plan.blocks_accessed(), 4);
        assert_eq!(plan.distinct_values("ay"), 1);
    }

    #[test]
    fn test_unsatisfiable_constant_term_yields_nothing() {
        let pred = Predicate::from_term(Term::equal(
            Expression::constant(1),
            Expression::constant(2),
        ));
        let plan = SelectPlan::new(table_a(), pred);
        assert_eq!(plan.records_output(), 0);
        assert_eq!(plan.blocks_accessed(), 4);
        assert_eq!(plan.distinct_values("ax"), 1);

        let mut scan = plan.open().unwrap();
        assert!(!scan.next().unwrap());
    }
}
