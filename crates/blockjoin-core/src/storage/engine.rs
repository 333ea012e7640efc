//! Storage engine implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use sled::{Db, Tree};
use tracing::debug;

use super::buffer::{BufferMonitor, BufferStats};
use super::{IndexFile, StorageConfig, TableFile, Transaction};
use crate::catalog::Layout;
use crate::error::Error;

/// Tree name prefix for base tables.
pub const TABLE_TREE_PREFIX: &str = "table:";

/// Tree name prefix for secondary indexes.
pub const INDEX_TREE_PREFIX: &str = "index:";

/// Tree name prefix for temporary tables.
pub const TEMP_TREE_PREFIX: &str = "temp:";

/// The storage engine wrapping sled.
///
/// Every table, index and temporary table lives in its own sled tree. The
/// engine also owns the buffer monitor that cursors report block accesses to.
pub struct StorageEngine {
    /// The underlying sled database.
    db: Db,

    /// Configuration the engine was opened with.
    config: StorageConfig,

    /// Block residency and hit/miss counters.
    buffers: BufferMonitor,

    /// Counter for temporary table names.
    next_temp: AtomicU64,

    /// Stable numeric ids for tree names, used in block ids.
    file_ids: Mutex<HashMap<String, u64>>,

    /// Next unassigned file id.
    next_file_id: AtomicU64,

    /// Next transaction id.
    next_tx: AtomicU64,
}

impl StorageEngine {
    /// Open or create a storage engine with the given configuration.
    pub fn open(config: StorageConfig) -> Result<Arc<Self>, Error> {
        let db = config.to_sled_config().open()?;
        let buffers = BufferMonitor::new(config.buffer_pool_size);

        // Temp tables never outlive a session.
        for name in db.tree_names() {
            if name.starts_with(TEMP_TREE_PREFIX.as_bytes()) {
                db.drop_tree(&name)?;
            }
        }

        Ok(Arc::new(Self {
            db,
            config,
            buffers,
            next_temp: AtomicU64::new(0),
            file_ids: Mutex::new(HashMap::new()),
            next_file_id: AtomicU64::new(1),
            next_tx: AtomicU64::new(1),
        }))
    }

    /// The underlying sled database.
    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Logical block size in bytes.
    pub fn block_size(&self) -> usize {
        self.config.block_size
    }

    /// Number of buffers in the pool.
    pub fn buffer_pool_size(&self) -> usize {
        self.config.buffer_pool_size
    }

    /// Buffer monitor shared by all cursors.
    pub fn buffers(&self) -> &BufferMonitor {
        &self.buffers
    }

    /// Snapshot of the buffer hit/miss counters.
    pub fn buffer_stats(&self) -> BufferStats {
        self.buffers.stats()
    }

    /// Open the file backing a base table.
    pub fn table_file(self: &Arc<Self>, table: &str, layout: Layout) -> Result<TableFile, Error> {
        let name = format!("{}{}", TABLE_TREE_PREFIX, table);
        let (file_id, tree) = self.open_tree(&name)?;
        Ok(TableFile::new(Arc::clone(self), name, file_id, tree, layout))
    }

    /// Open the file backing a secondary index.
    pub fn index_file(self: &Arc<Self>, index: &str, layout: Layout) -> Result<IndexFile, Error> {
        let name = format!("{}{}", INDEX_TREE_PREFIX, index);
        let (file_id, tree) = self.open_tree(&name)?;
        Ok(IndexFile::new(Arc::clone(self), file_id, tree, layout))
    }

    /// Allocate a fresh, empty temporary file.
    pub(crate) fn temp_file(self: &Arc<Self>, layout: Layout) -> Result<TableFile, Error> {
        let n = self.next_temp.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}{}", TEMP_TREE_PREFIX, n);
        let (file_id, tree) = self.open_tree(&name)?;
        tree.clear()?;
        debug!(temp = %name, "allocated temporary table");
        Ok(TableFile::new(Arc::clone(self), name, file_id, tree, layout))
    }

    /// Remove a file and forget its resident blocks.
    pub(crate) fn drop_file(&self, name: &str) -> Result<(), Error> {
        if let Some(file_id) = self.file_ids.lock().remove(name) {
            self.buffers.evict_file(file_id);
        }
        self.db.drop_tree(name)?;
        Ok(())
    }

    /// Start a transaction.
    pub fn begin(self: &Arc<Self>) -> Transaction {
        let id = self.next_tx.fetch_add(1, Ordering::Relaxed);
        Transaction::new(Arc::clone(self), id)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }

    fn open_tree(&self, name: &str) -> Result<(u64, Tree), Error> {
        let tree = self.db.open_tree(name)?;
        // Ids of dropped files are never reused.
        let file_id = *self
            .file_ids
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| self.next_file_id.fetch_add(1, Ordering::Relaxed));
        Ok((file_id, tree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDef, Schema};
    use crate::query::Constant;

    fn layout() -> Layout {
        let schema = Schema::new().with_field(FieldDef::int("a"));
        Layout::new(&schema, 400)
    }

    #[test]
    fn test_open_temporary() {
        let engine = StorageEngine::open(StorageConfig::temporary()).unwrap();
        assert_eq!(engine.block_size(), 400);
        assert_eq!(engine.buffer_pool_size(), 8);
        assert_eq!(engine.buffer_stats(), BufferStats::default());
    }

    #[test]
    fn test_table_file_reopen_sees_rows() {
        let engine = StorageEngine::open(StorageConfig::temporary()).unwrap();
        let file = engine.table_file("t", layout()).unwrap();
        file.insert(&[Constant::Int(1)]).unwrap();

        let again = engine.table_file("t", layout()).unwrap();
        assert_eq!(again.row_count().unwrap(), 1);
        assert_eq!(file.file_id(), again.file_id());
    }

    #[test]
    fn test_temp_files_are_distinct() {
        let engine = StorageEngine::open(StorageConfig::temporary()).unwrap();
        let a = engine.temp_file(layout()).unwrap();
        let b = engine.temp_file(layout()).unwrap();
        assert_ne!(a.name(), b.name());
        assert_ne!(a.file_id(), b.file_id());

        a.insert(&[Constant::Int(1)]).unwrap();
        assert_eq!(b.row_count().unwrap(), 0);
    }

    #[test]
    fn test_drop_file() {
        let engine = StorageEngine::open(StorageConfig::temporary()).unwrap();
        let temp = engine.temp_file(layout()).unwrap();
        let name = temp.name().to_string();
        engine.drop_file(&name).unwrap();
        assert!(!engine
            .db()
            .tree_names()
            .iter()
            .any(|n| n.as_ref() == name.as_bytes()));
    }
}
