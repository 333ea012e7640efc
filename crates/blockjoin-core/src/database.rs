//! Database wrapper combining the storage engine and the catalog.

use std::sync::Arc;

use tracing::{debug, info};

use crate::catalog::{Catalog, Schema};
use crate::error::Error;
use crate::opt::{HeuristicPlanner, JoinReport, PlannedQuery, PlanningConfig, QueryData, TablePlanner};
use crate::query::{Constant, Predicate};
use crate::storage::{BufferStats, StorageConfig, StorageEngine, Transaction};

/// Rows produced by a query together with how it was planned.
#[derive(Debug, Clone)]
pub struct QueryResult {
    /// Output field names, in row order.
    pub fields: Vec<String>,
    /// Output rows.
    pub rows: Vec<Vec<Constant>>,
    /// Rendered plan tree.
    pub plan_summary: String,
    /// Estimated block reads of the plan.
    pub blocks_estimate: u64,
    /// One report per join step.
    pub reports: Vec<JoinReport>,
}

/// An open database.
pub struct Database {
    storage: Arc<StorageEngine>,
    catalog: Catalog,
}

impl Database {
    /// Open a database with the given storage configuration.
    pub fn open(config: StorageConfig) -> Result<Self, Error> {
        let storage = StorageEngine::open(config)?;
        let catalog = Catalog::open(storage.clone())?;
        info!(tables = catalog.list_tables().len(), "opened database");
        Ok(Self { storage, catalog })
    }

    /// Open an in-memory database that is discarded on drop.
    pub fn temporary() -> Result<Self, Error> {
        Self::open(StorageConfig::temporary())
    }

    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn create_table(&self, name: &str, schema: Schema) -> Result<(), Error> {
        self.catalog.create_table(name, schema)
    }

    /// Create an index over the rows already stored and every later insert.
    pub fn create_index(&self, name: &str, table: &str, field: &str) -> Result<(), Error> {
        self.catalog.create_index(name, table, field)?;
        Ok(())
    }

    /// Insert one row, returning its row id.
    pub fn insert(&self, table: &str, row: Vec<Constant>) -> Result<u64, Error> {
        self.insert_rows(table, std::iter::once(row))
            .map(|ids| ids.first().copied().unwrap_or_default())
    }

    /// Insert rows, returning their row ids.
    ///
    /// Every value is checked against the schema before it is written, and
    /// every index of the table receives an entry.
    pub fn insert_rows(
        &self,
        table: &str,
        rows: impl IntoIterator<Item = Vec<Constant>>,
    ) -> Result<Vec<u64>, Error> {
        let schema = self.catalog.table_schema(table)?;
        let file = self.catalog.table_file(table)?;
        let indexes = self.catalog.index_files(table)?;

        let mut ids = Vec::new();
        for row in rows {
            check_row(&schema, &row)?;
            let row_id = file.insert(&row)?;
            for (pos, index) in &indexes {
                if let Some(value) = row.get(*pos) {
                    index.insert(value, row_id)?;
                }
            }
            ids.push(row_id);
        }

        self.catalog.invalidate_stats(table);
        debug!(table, rows = ids.len(), "inserted rows");
        Ok(ids)
    }

    /// Start a transaction for planning and execution.
    pub fn transaction(&self) -> Transaction {
        self.storage.begin()
    }

    /// Planner for one table of a query.
    pub fn table_planner(&self, table: &str, predicate: Predicate) -> Result<TablePlanner, Error> {
        TablePlanner::new(&self.transaction(), table, predicate, &self.catalog)
    }

    /// Plan a query without running it.
    pub fn plan_query(&self, query: &QueryData, config: &PlanningConfig) -> Result<PlannedQuery, Error> {
        HeuristicPlanner::new(&self.catalog, self.transaction()).plan(query, config)
    }

    /// Plan and run a query, collecting every output row.
    pub fn execute(&self, query: &QueryData, config: &PlanningConfig) -> Result<QueryResult, Error> {
        let planned = self.plan_query(query, config)?;
        let fields: Vec<String> = planned.plan.schema().fields().map(str::to_string).collect();

        let mut scan = planned.plan.open()?;
        let mut rows = Vec::new();
        while scan.next()? {
            let row = fields
                .iter()
                .map(|f| scan.get_val(f))
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(row);
        }
        drop(scan);

        debug!(rows = rows.len(), "executed query");
        Ok(QueryResult {
            fields,
            rows,
            plan_summary: planned.plan.explain(),
            blocks_estimate: planned.plan.blocks_accessed(),
            reports: planned.reports,
        })
    }

    /// Buffer hits and misses since the last reset.
    pub fn buffer_stats(&self) -> BufferStats {
        self.storage.buffer_stats()
    }

    pub fn reset_buffer_stats(&self) {
        self.storage.buffers().reset();
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.catalog.flush()?;
        self.storage.flush()
    }
}

fn check_row(schema: &Schema, row: &[Constant]) -> Result<(), Error> {
    if row.len() != schema.len() {
        return Err(Error::InvalidData(format!(
            "expected {} values, got {}",
            schema.len(),
            row.len()
        )));
    }
    for (def, value) in schema.field_defs().iter().zip(row) {
        if !value.fits(def.field_type) {
            return Err(Error::TypeMismatch {
                field: def.name.clone(),
                expected: def.field_type.name(),
            });
        }
    }
    Ok(())
}
