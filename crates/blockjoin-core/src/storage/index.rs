//! Secondary index files.
//!
//! Entries are keys of the form `sortable(value) ++ row_id`, so all rows
//! holding one value form a contiguous key range.

use std::sync::Arc;

use sled::Tree;

use super::buffer::BlockId;
use super::codec::{encode_sortable, index_entry_key, row_id_from_index_key};
use super::StorageEngine;
use crate::catalog::Layout;
use crate::error::Error;
use crate::query::Constant;

/// Handle to a secondary index.
#[derive(Clone)]
pub struct IndexFile {
    engine: Arc<StorageEngine>,
    file_id: u64,
    tree: Tree,
    layout: Layout,
}

impl IndexFile {
    pub(crate) fn new(engine: Arc<StorageEngine>, file_id: u64, tree: Tree, layout: Layout) -> Self {
        Self {
            engine,
            file_id,
            tree,
            layout,
        }
    }

    /// Add an entry for `row_id`.
    pub fn insert(&self, value: &Constant, row_id: u64) -> Result<(), Error> {
        self.tree.insert(index_entry_key(value, row_id), Vec::<u8>::new())?;
        Ok(())
    }

    /// Ids of all rows holding `value`, in row order.
    pub fn lookup(&self, value: &Constant) -> Result<Vec<u64>, Error> {
        let mut prefix = Vec::with_capacity(8);
        encode_sortable(value, &mut prefix);

        let mut row_ids = Vec::new();
        for entry in self.tree.scan_prefix(&prefix) {
            let (key, _) = entry?;
            row_ids.push(row_id_from_index_key(&key)?);
        }

        // Leaves are filled in insertion order, so the first matching row
        // identifies the leaf block the probe lands on.
        let leaf = row_ids
            .first()
            .map_or(0, |id| id / self.layout.records_per_block());
        self.engine.buffers().pin(BlockId::new(self.file_id, leaf));

        Ok(row_ids)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Whether the index has no entries.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}
