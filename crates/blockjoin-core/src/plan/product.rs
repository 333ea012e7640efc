//! Cartesian products.

use super::chunk::ChunkedLoopScan;
use super::Plan;
use crate::catalog::{Layout, Schema};
use crate::error::Error;
use crate::query::{Constant, Scan};
use crate::storage::Transaction;

/// Tuple-at-a-time product: the right side is rescanned for every left row.
#[derive(Debug, Clone)]
pub struct ProductPlan {
    lhs: Box<Plan>,
    rhs: Box<Plan>,
    schema: Schema,
}

impl ProductPlan {
    pub fn new(lhs: Plan, rhs: Plan) -> Result<Self, Error> {
        let schema = Schema::join(lhs.schema(), rhs.schema())?;
        Ok(Self {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            schema,
        })
    }

    /// Cost of a tuple-at-a-time product of `lhs` and `rhs`: `B(l) + R(l) * B(r)`.
    pub fn cost_of(lhs: &Plan, rhs: &Plan) -> u64 {
        lhs.blocks_accessed()
            .saturating_add(lhs.records_output().saturating_mul(rhs.blocks_accessed()))
    }

    pub fn lhs(&self) -> &Plan {
        &self.lhs
    }

    pub fn rhs(&self) -> &Plan {
        &self.rhs
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn blocks_accessed(&self) -> u64 {
        Self::cost_of(&self.lhs, &self.rhs)
    }

    pub fn records_output(&self) -> u64 {
        self.lhs
            .records_output()
            .saturating_mul(self.rhs.records_output())
    }

    pub fn distinct_values(&self, field: &str) -> u64 {
        side_distinct_values(&self.lhs, &self.rhs, field)
    }

    pub fn open(&self) -> Result<Box<dyn Scan>, Error> {
        Ok(Box::new(ProductScan::new(self.lhs.open()?, self.rhs.open()?)))
    }
}

/// Block-at-a-time product: the left side is read in chunks of
/// `available_buffers` blocks and the right side is rescanned once per chunk.
#[derive(Debug, Clone)]
pub struct MultibufferProductPlan {
    tx: Transaction,
    lhs: Box<Plan>,
    rhs: Box<Plan>,
    schema: Schema,
}

impl MultibufferProductPlan {
    pub fn new(tx: &Transaction, lhs: Plan, rhs: Plan) -> Result<Self, Error> {
        let schema = Schema::join(lhs.schema(), rhs.schema())?;
        Ok(Self {
            tx: tx.clone(),
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            schema,
        })
    }

    pub fn lhs(&self) -> &Plan {
        &self.lhs
    }

    pub fn rhs(&self) -> &Plan {
        &self.rhs
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// `B(l) + ceil(B(l) / buffers) * B(r)`
    pub fn blocks_accessed(&self) -> u64 {
        let lhs_blocks = self.lhs.blocks_accessed();
        let chunks = lhs_blocks.div_ceil(self.tx.available_buffers().max(1));
        lhs_blocks.saturating_add(chunks.saturating_mul(self.rhs.blocks_accessed()))
    }

    pub fn records_output(&self) -> u64 {
        self.lhs
            .records_output()
            .saturating_mul(self.rhs.records_output())
    }

    pub fn distinct_values(&self, field: &str) -> u64 {
        side_distinct_values(&self.lhs, &self.rhs, field)
    }

    pub fn open(&self) -> Result<Box<dyn Scan>, Error> {
        let chunk_rows = chunk_rows(&self.tx, self.lhs.schema());
        Ok(Box::new(ChunkedLoopScan::new(
            self.lhs.open()?,
            self.lhs.schema(),
            self.rhs.open()?,
            chunk_rows,
            None,
        )))
    }
}

/// Rows of `schema` that fit in the transaction's buffers.
pub(crate) fn chunk_rows(tx: &Transaction, schema: &Schema) -> usize {
    let rpb = Layout::new(schema, tx.block_size()).records_per_block();
    usize::try_from(rpb.saturating_mul(tx.available_buffers())).unwrap_or(usize::MAX)
}

/// Distinct values of a field taken from whichever input carries it.
pub(crate) fn side_distinct_values(lhs: &Plan, rhs: &Plan, field: &str) -> u64 {
    if lhs.schema().has_field(field) {
        lhs.distinct_values(field)
    } else {
        rhs.distinct_values(field)
    }
}

/// Nested loop over two cursors.
pub struct ProductScan {
    lhs: Box<dyn Scan>,
    rhs: Box<dyn Scan>,
    lhs_valid: bool,
    started: bool,
}

impl ProductScan {
    pub fn new(lhs: Box<dyn Scan>, rhs: Box<dyn Scan>) -> Self {
        Self {
            lhs,
            rhs,
            lhs_valid: false,
            started: false,
        }
    }
}

impl Scan for ProductScan {
    fn before_first(&mut self) -> Result<(), Error> {
        self.lhs.before_first()?;
        self.lhs_valid = self.lhs.next()?;
        self.rhs.before_first()?;
        self.started = true;
        Ok(())
    }

    fn next(&mut self) -> Result<bool, Error> {
        if !self.started {
            self.before_first()?;
        }
        while self.lhs_valid {
            if self.rhs.next()? {
                return Ok(true);
            }
            self.rhs.before_first()?;
            self.lhs_valid = self.lhs.next()?;
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
