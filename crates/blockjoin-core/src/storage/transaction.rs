//! Transaction handle passed to plans.

use std::sync::Arc;

use super::{StorageEngine, TempTable};
use crate::catalog::{Layout, Schema};
use crate::error::Error;

/// Execution context for one query.
///
/// Plans read the block size and buffer budget from it and allocate their
/// temporary tables through it. Cloning yields another handle to the same
/// transaction.
#[derive(Clone)]
pub struct Transaction {
    engine: Arc<StorageEngine>,
    id: u64,
}

impl Transaction {
    pub(crate) fn new(engine: Arc<StorageEngine>, id: u64) -> Self {
        Self { engine, id }
    }

    /// Transaction id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The storage engine this transaction runs against.
    pub fn engine(&self) -> &Arc<StorageEngine> {
        &self.engine
    }

    /// Logical block size in bytes.
    pub fn block_size(&self) -> usize {
        self.engine.block_size()
    }

    /// Buffers a single operator may use for its working set.
    pub fn available_buffers(&self) -> u64 {
        self.engine.buffer_pool_size() as u64
    }

    /// Create an empty temporary table with the given schema.
    pub fn create_temp_table(&self, schema: Schema) -> Result<TempTable, Error> {
        let layout = Layout::new(&schema, self.block_size());
        let file = self.engine.temp_file(layout)?;
        Ok(TempTable::new(file, schema))
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction").field("id", &self.id).finish()
    }
}
