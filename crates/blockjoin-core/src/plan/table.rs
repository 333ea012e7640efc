//! Base table access path.

use crate::catalog::{Catalog, Layout, Schema, StatInfo};
use crate::error::Error;
use crate::query::Scan;
use crate::storage::{TableFile, TableScan, Transaction};

/// Full scan of a stored table, costed from catalog statistics.
#[derive(Clone)]
pub struct TablePlan {
    table: String,
    schema: Schema,
    layout: Layout,
    stats: StatInfo,
    file: TableFile,
}

impl TablePlan {
    /// Plan a scan of `table`.
    pub fn new(tx: &Transaction, table: &str, catalog: &Catalog) -> Result<Self, Error> {
        let schema = catalog.table_schema(table)?;
        let layout = Layout::new(&schema, tx.block_size());
        let stats = catalog.stat_info(table)?;
        let file = tx.engine().table_file(table, layout)?;
        Ok(Self {
            table: table.to_string(),
            schema,
            layout,
            stats,
            file,
        })
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn file(&self) -> &TableFile {
        &self.file
    }

    pub fn blocks_accessed(&self) -> u64 {
        self.stats.blocks_accessed()
    }

    pub fn records_output(&self) -> u64 {
        self.stats.records_output()
    }

    pub fn distinct_values(&self, field: &str) -> u64 {
        self.stats.distinct_values(field)
    }

    /// Open a scan over the table.
    pub fn open_table(&self) -> TableScan {
        self.file.scan(self.schema.clone())
    }

    pub fn open(&self) -> Result<Box<dyn Scan>, Error> {
        Ok(Box::new(self.open_table()))
    }
}

impl std::fmt::Debug for TablePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TablePlan")
            .field("table", &self.table)
            .field("stats", &self.stats)
            .finish()
    }
}
