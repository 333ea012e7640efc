//! Index nested loop join.

use super::{Plan, TablePlan};
use crate::catalog::{IndexInfo, Schema};
use crate::error::Error;
use crate::query::{Constant, Scan};
use crate::storage::{IndexFile, TableFile};

/// For each outer row, probes an index on the inner table with the value of
/// the outer join field.
#[derive(Debug, Clone)]
pub struct IndexJoinPlan {
    outer: Box<Plan>,
    inner: TablePlan,
    index: IndexInfo,
    join_field: String,
    schema: Schema,
}

impl IndexJoinPlan {
    /// Join `outer.join_field = inner.<indexed field>`.
    pub fn new(
        outer: Plan,
        inner: TablePlan,
        index: IndexInfo,
        join_field: impl Into<String>,
    ) -> Result<Self, Error> {
        let join_field = join_field.into();
        if !outer.schema().has_field(&join_field) {
            return Err(Error::UnknownField(join_field));
        }
        let schema = Schema::join(outer.schema(), inner.schema())?;
        Ok(Self {
            outer: Box::new(outer),
            inner,
            index,
            join_field,
            schema,
        })
    }

    pub fn outer(&self) -> &Plan {
        &self.outer
    }

    pub fn inner(&self) -> &TablePlan {
        &self.inner
    }

    pub fn index(&self) -> &IndexInfo {
        &self.index
    }

    /// Outer field whose value drives each probe.
    pub fn join_field(&self) -> &str {
        &self.join_field
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// `B(outer) + R(outer) * probe cost`
    pub fn blocks_accessed(&self) -> u64 {
        self.outer.blocks_accessed().saturating_add(
            self.outer
                .records_output()
                .saturating_mul(self.index.blocks_accessed()),
        )
    }

    pub fn records_output(&self) -> u64 {
        let factor = self
            .outer
            .distinct_values(&self.join_field)
            .max(self.inner.distinct_values(self.index.field()))
            .max(1);
        self.outer
            .records_output()
            .saturating_mul(self.inner.records_output())
            / factor
    }

    pub fn distinct_values(&self, field: &str) -> u64 {
        if self.outer.schema().has_field(field) {
            self.outer.distinct_values(field)
        } else {
            self.inner.distinct_values(field)
        }
    }

    pub fn open(&self) -> Result<Box<dyn Scan>, Error> {
        Ok(Box::new(IndexJoinScan {
            outer: self.outer.open()?,
            index: self.index.open_in(self.inner.file().engine())?,
            file: self.inner.file().clone(),
            inner_schema: self.inner.schema().clone(),
            join_field: self.join_field.clone(),
            matches: Vec::new(),
            next_match: 0,
            current: None,
        }))
    }
}

pub struct IndexJoinScan {
    outer: Box<dyn Scan>,
    index: IndexFile,
    file: TableFile,
    inner_schema: Schema,
    join_field: String,
    matches: Vec<u64>,
    next_match: usize,
    current: Option<Vec<Constant>>,
}

impl Scan for IndexJoinScan {
    fn before_first(&mut self) -> Result<(), Error> {
        self.outer.before_first()?;
        self.matches.clear();
        self.next_match = 0;
        self.current = None;
        Ok(())
    }

    fn next(&mut self) -> Result<bool, Error> {
        loop {
            while let Some(&row_id) = self.matches.get(self.next_match) {
                self.next_match += 1;
                if let Some(row) = self.file.get(row_id)? {
                    self.current = Some(row);
                    return Ok(true);
                }
            }
            if !self.outer.next()? {
                self.current = None;
                return Ok(false);
            }
            let value = self.outer.get_val(&self.join_field)?;
            self.matches = self.index.lookup(&value)?;
            self.next_match = 0;
        }
    }

    fn get_val(&self, field: &str) -> Result<Constant, Error> {
        match self.inner_schema.position(field) {
            Some(pos) => self
                .current
                .as_ref()
                .and_then(|row| row.get(pos).cloned())
                .ok_or_else(|| Error::InvalidData("scan is not positioned on a row".into())),
            None => self.outer.get_val(field),
        }
    }

    fn has_field(&self, field: &str) -> bool {
        self.inner_schema.has_field(field) || self.outer.has_field(field)
    }
}
