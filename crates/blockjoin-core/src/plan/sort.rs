//! Sorting into an ordered temporary table.

use std::sync::Arc;

use super::materialize::{materialized_blocks, read_all, write_temp};
use super::Plan;
use crate::catalog::Schema;
use crate::error::Error;
use crate::query::Scan;
use crate::storage::{TableScan, Transaction};

/// The child's rows ordered on one key field.
#[derive(Debug, Clone)]
pub struct SortPlan {
    tx: Transaction,
    child: Box<Plan>,
    key: String,
}

impl SortPlan {
    pub fn new(tx: &Transaction, child: Plan, key: impl Into<String>) -> Result<Self, Error> {
        let key = key.into();
        if !child.schema().has_field(&key) {
            return Err(Error::UnknownField(key));
        }
        Ok(Self {
            tx: tx.clone(),
            child: Box::new(child),
            key,
        })
    }

    pub fn child(&self) -> &Plan {
        &self.child
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn schema(&self) -> &Schema {
        self.child.schema()
    }

    /// Read the input, write the sorted run, read the run back.
    pub fn blocks_accessed(&self) -> u64 {
        let run = materialized_blocks(&self.tx, &self.child);
        self.child
            .blocks_accessed()
            .saturating_add(run.saturating_mul(2))
    }

    pub fn records_output(&self) -> u64 {
        self.child.records_output()
    }

    pub fn distinct_values(&self, field: &str) -> u64 {
        self.child.distinct_values(field)
    }

    /// Sort the input and open a cursor over the ordered run.
    pub fn open_sorted(&self) -> Result<TableScan, Error> {
        let schema = self.child.schema();
        let pos = schema
            .position(&self.key)
            .ok_or_else(|| Error::UnknownField(self.key.clone()))?;

        let mut src = self.child.open()?;
        let mut rows = read_all(src.as_mut(), schema)?;
        drop(src);
        rows.sort_by(|a, b| a[pos].cmp(&b[pos]));

        let temp = Arc::new(write_temp(&self.tx, schema, &rows)?);
        Ok(temp.open())
    }

    pub fn open(&self) -> Result<Box<dyn Scan>, Error> {
        Ok(Box::new(self.open_sorted()?))
    }
}
