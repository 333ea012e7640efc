//! Point selection through a secondary index.

use super::TablePlan;
use crate::catalog::{IndexInfo, Schema};
use crate::error::Error;
use crate::query::{Constant, Scan};
use crate::storage::{IndexFile, TableFile};

/// Rows of a table whose indexed field equals a constant.
#[derive(Debug, Clone)]
pub struct IndexSelectPlan {
    table: TablePlan,
    index: IndexInfo,
    value: Constant,
}

impl IndexSelectPlan {
    pub fn new(table: TablePlan, index: IndexInfo, value: Constant) -> Self {
        Self {
            table,
            index,
            value,
        }
    }

    pub fn table(&self) -> &TablePlan {
        &self.table
    }

    pub fn index(&self) -> &IndexInfo {
        &self.index
    }

    pub fn value(&self) -> &Constant {
        &self.value
    }

    pub fn schema(&self) -> &Schema {
        self.table.schema()
    }

    /// One probe plus one block per matching row.
    pub fn blocks_accessed(&self) -> u64 {
        self.index
            .blocks_accessed()
            .saturating_add(self.records_output())
    }

    pub fn records_output(&self) -> u64 {
        self.index.records_output()
    }

    pub fn distinct_values(&self, field: &str) -> u64 {
        self.index.distinct_values(field)
    }

    pub fn open(&self) -> Result<Box<dyn Scan>, Error> {
        Ok(Box::new(IndexSelectScan {
            index: self.index.open_in(self.table.file().engine())?,
            file: self.table.file().clone(),
            schema: self.table.schema().clone(),
            value: self.value.clone(),
            matches: Vec::new(),
            next_match: 0,
            probed: false,
            current: None,
        }))
    }
}

/// Cursor fetching the rows an index probe returns.
pub struct IndexSelectScan {
    index: IndexFile,
    file: TableFile,
    schema: Schema,
    value: Constant,
    matches: Vec<u64>,
    next_match: usize,
    probed: bool,
    current: Option<Vec<Constant>>,
}

impl Scan for IndexSelectScan {
    fn before_first(&mut self) -> Result<(), Error> {
        self.matches = self.index.lookup(&self.value)?;
        self.next_match = 0;
        self.probed = true;
        self.current = None;
        Ok(())
    }

    fn next(&mut self) -> Result<bool, Error> {
        if !self.probed {
            self.before_first()?;
        }
        while let Some(&row_id) = self.matches.get(self.next_match) {
            self.next_match += 1;
            if let Some(row) = self.file.get(row_id)? {
                self.current = Some(row);
                return Ok(true);
            }
        }
        self.current = None;
        Ok(false)
    }

    fn get_val(&self, field: &str) -> Result<Constant, Error> {
        let pos = self
            .schema
            .position(field)
            .ok_or_else(|| Error::UnknownField(field.to_string()))?;
        self.current
            .as_ref()
            .and_then(|row| row.get(pos).cloned())
            .ok_or_else(|| Error::InvalidData("scan is not positioned on a row".into()))
    }

    fn has_field(&self, field: &str) -> bool {
        self.schema.has_field(field)
    }
}
