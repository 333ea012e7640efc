//! Sort-merge join on one pair of equated fields.

use super::product::side_distinct_values;
use super::{Plan, SortPlan};
use crate::catalog::Schema;
use crate::error::Error;
use crate::query::{Constant, Scan};
use crate::storage::{TableScan, Transaction};

#[derive(Debug, Clone)]
pub struct MergeJoinPlan {
    lhs: Box<Plan>,
    rhs: Box<Plan>,
    lhs_field: String,
    rhs_field: String,
    schema: Schema,
}

impl MergeJoinPlan {
    /// Join `lhs.lhs_field = rhs.rhs_field`, sorting both inputs on the key.
    pub fn new(
        tx: &Transaction,
        lhs: Plan,
        rhs: Plan,
        lhs_field: impl Into<String>,
        rhs_field: impl Into<String>,
    ) -> Result<Self, Error> {
        let schema = Schema::join(lhs.schema(), rhs.schema())?;
        let lhs_field = lhs_field.into();
        let rhs_field = rhs_field.into();
        let lhs = Plan::Sort(SortPlan::new(tx, lhs, lhs_field.clone())?);
        let rhs = Plan::Sort(SortPlan::new(tx, rhs, rhs_field.clone())?);
        Ok(Self {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            lhs_field,
            rhs_field,
            schema,
        })
    }

    /// Sorted left input.
    pub fn lhs(&self) -> &Plan {
        &self.lhs
    }

    /// Sorted right input.
    pub fn rhs(&self) -> &Plan {
        &self.rhs
    }

    pub fn lhs_field(&self) -> &str {
        &self.lhs_field
    }

    pub fn rhs_field(&self) -> &str {
        &self.rhs_field
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Both sorts; the merge pass reads the runs the sorts already count.
    pub fn blocks_accessed(&self) -> u64 {
        self.lhs
            .blocks_accessed()
            .saturating_add(self.rhs.blocks_accessed())
    }

    pub fn records_output(&self) -> u64 {
        let factor = self
            .lhs
            .distinct_values(&self.lhs_field)
            .max(self.rhs.distinct_values(&self.rhs_field))
            .max(1);
        self.lhs
            .records_output()
            .saturating_mul(self.rhs.records_output())
            / factor
    }

    pub fn distinct_values(&self, field: &str) -> u64 {
        side_distinct_values(&self.lhs, &self.rhs, field)
    }

    pub fn open(&self) -> Result<Box<dyn Scan>, Error> {
        let (Plan::Sort(lhs), Plan::Sort(rhs)) = (self.lhs.as_ref(), self.rhs.as_ref()) else {
            return Err(Error::InvalidData("merge join inputs must be sorted".into()));
        };
        Ok(Box::new(MergeJoinScan {
            lhs: lhs.open_sorted()?,
            rhs: rhs.open_sorted()?,
            lhs_field: self.lhs_field.clone(),
            rhs_field: self.rhs_field.clone(),
            join_val: None,
            group_start: None,
        }))
    }
}

/// Merges two sorted runs, pairing every left row with every right row of
/// the same key before moving past the key group.
pub struct MergeJoinScan {
    lhs: TableScan,
    rhs: TableScan,
    lhs_field: String,
    rhs_field: String,
    join_val: Option<Constant>,
    group_start: Option<u64>,
}

impl Scan for MergeJoinScan {
    fn before_first(&mut self) -> Result<(), Error> {
        self.lhs.before_first()?;
        self.rhs.before_first()?;
        self.join_val = None;
        self.group_start = None;
        Ok(())
    }

    fn next(&mut self) -> Result<bool, Error> {
        // Next right row of the current group.
        let mut rhs_more = self.rhs.next()?;
        if rhs_more && self.join_val.as_ref() == Some(&self.rhs.get_val(&self.rhs_field)?) {
            return Ok(true);
        }

        // Next left row with the same key replays the group.
        let mut lhs_more = self.lhs.next()?;
        if lhs_more && self.join_val.as_ref() == Some(&self.lhs.get_val(&self.lhs_field)?) {
            if let Some(start) = self.group_start {
                self.rhs.restore(start)?;
                return Ok(true);
            }
        }

        while lhs_more && rhs_more {
            let l = self.lhs.get_val(&self.lhs_field)?;
            let r = self.rhs.get_val(&self.rhs_field)?;
            match l.cmp(&r) {
                std::cmp::Ordering::Less => lhs_more = self.lhs.next()?,
                std::cmp::Ordering::Greater => rhs_more = self.rhs.next()?,
                std::cmp::Ordering::Equal => {
                    self.group_start = self.rhs.position();
                    self.join_val = Some(r);
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn get_val(&self, field: &str) -> Result<Constant, Error> {
        if self.lhs.has_field(field) {
            self.lhs.get_val(field)
        } else {
            self.rhs.get_val(field)
        }
    }

    fn has_field(&self, field: &str) -> bool {
        self.lhs.has_field(field) || self.rhs.has_field(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, FieldDef};
    use crate::plan::TablePlan;
    use crate::storage::{StorageConfig, StorageEngine};

    /// `a`: 12 rows, `ay` in 0..4 three times each.
    /// `b`: 9 rows, `by` in 0..3 three times each.
    fn setup() -> (Transaction, Plan, Plan) {
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
        for i in 0..12 {
            file.insert(&[Constant::Int(i), Constant::Int(i % 4)]).unwrap();
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
        for i in 0..9 {
            file.insert(&[Constant::Int(i % 3), Constant::Int(i)]).unwrap();
        }

        let tx = engine.begin();
        let a = Plan::Table(TablePlan::new(&tx, "a", &catalog).unwrap());
        let b = Plan::Table(TablePlan::new(&tx, "b", &catalog).unwrap());
        (tx, a, b)
    }

    fn pairs(scan: &mut dyn Scan) -> Vec<(i32, i32)> {
        let mut rows = Vec::new();
        scan.before_first().unwrap();
        while scan.next().unwrap() {
            assert_eq!(scan.get_int("ay").unwrap(), scan.get_int("by").unwrap());
            rows.push((scan.get_int("ax").unwrap(), scan.get_int("bz").unwrap()));
        }
        rows.sort();
        rows
    }

    fn expected() -> Vec<(i32, i32)> {
        let mut rows = Vec::new();
        for ax in 0..12 {
            for bz in 0..9 {
                if ax % 4 == bz % 3 {
                    rows.push((ax, bz));
                }
            }
        }
        rows.sort();
        rows
    }

    #[test]
    fn test_duplicate_keys_on_both_sides() {
        let (tx, a, b) = setup();
        // The last right group (key 2) runs out while left rows with key 2 remain.
        let plan = MergeJoinPlan::new(&tx, a, b, "ay", "by").unwrap();
        let mut scan = plan.open().unwrap();
        let rows = pairs(scan.as_mut());
        assert_eq!(rows.len(), 27);
        assert_eq!(rows, expected());

        // A second pass replays the same rows.
        assert_eq!(pairs(scan.as_mut()), rows);
    }

    #[test]
    fn test_duplicate_keys_reversed_operands() {
        let (tx, a, b) = setup();
        // Right side now has an unmatched trailing group (key 3).
        let plan = MergeJoinPlan::new(&tx, b, a, "by", "ay").unwrap();
        let mut scan = plan.open().unwrap();
        assert_eq!(pairs(scan.as_mut()), expected());
    }

    #[test]
    fn test_inputs_are_sorted_and_costed() {
        let (tx, a, b) = setup();
        let plan = MergeJoinPlan::new(&tx, a, b, "ay", "by").unwrap();
        assert!(matches!(plan.lhs(), Plan::Sort(s) if s.key() == "ay"));
        assert!(matches!(plan.rhs(), Plan::Sort(s) if s.key() == "by"));
        assert_eq!(
            plan.blocks_accessed(),
            plan.lhs().blocks_accessed() + plan.rhs().blocks_accessed()
        );
        // 12 * 9 / max(4, 3)
        assert_eq!(plan.records_output(), 27);
    }
}
