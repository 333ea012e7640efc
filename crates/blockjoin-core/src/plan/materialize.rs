//! Materialization into temporary tables.

use std::sync::Arc;

use tracing::debug;

use super::Plan;
use crate::catalog::{Layout, Schema};
use crate::error::Error;
use crate::query::{Constant, Scan};
use crate::storage::{TempTable, Transaction};

/// The child's rows copied into a temporary table.
#[derive(Debug, Clone)]
pub struct MaterializePlan {
    tx: Transaction,
    child: Box<Plan>,
}

impl MaterializePlan {
    pub fn new(tx: &Transaction, child: Plan) -> Self {
        Self {
            tx: tx.clone(),
            child: Box::new(child),
        }
    }

    pub fn child(&self) -> &Plan {
        &self.child
    }

    pub fn schema(&self) -> &Schema {
        self.child.schema()
    }

    /// Blocks of the materialized table. Producing it is a one-time cost
    /// that is not counted here.
    pub fn blocks_accessed(&self) -> u64 {
        materialized_blocks(&self.tx, &self.child)
    }

    pub fn records_output(&self) -> u64 {
        self.child.records_output()
    }

    pub fn distinct_values(&self, field: &str) -> u64 {
        self.child.distinct_values(field)
    }

    pub fn open(&self) -> Result<Box<dyn Scan>, Error> {
        let temp = Arc::new(materialize(&self.tx, &self.child)?);
        Ok(Box::new(temp.open()))
    }
}

/// Estimated blocks of `plan`'s output once written to a table.
pub(crate) fn materialized_blocks(tx: &Transaction, plan: &Plan) -> u64 {
    Layout::new(plan.schema(), tx.block_size()).blocks_for(plan.records_output())
}

/// Copy every row `plan` produces into a new temporary table.
fn materialize(tx: &Transaction, plan: &Plan) -> Result<TempTable, Error> {
    let mut src = plan.open()?;
    let rows = read_all(src.as_mut(), plan.schema())?;
    write_temp(tx, plan.schema(), &rows)
}

/// Drain a cursor into memory, values in schema order.
pub(crate) fn read_all(src: &mut dyn Scan, schema: &Schema) -> Result<Vec<Vec<Constant>>, Error> {
    let fields: Vec<&str> = schema.fields().collect();
    let mut rows = Vec::new();
    src.before_first()?;
    while src.next()? {
        let row = fields
            .iter()
            .map(|f| src.get_val(f))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(row);
    }
    Ok(rows)
}

/// Write rows into a new temporary table.
pub(crate) fn write_temp(
    tx: &Transaction,
    schema: &Schema,
    rows: &[Vec<Constant>],
) -> Result<TempTable, Error> {
    let temp = tx.create_temp_table(schema.clone())?;
    for row in rows {
        temp.insert(row)?;
    }
    debug!(temp = %temp.name(), rows = rows.len(), "materialized rows");
    Ok(temp)
}
