//! Index metadata and cost estimates.

use std::sync::Arc;

use rkyv::{Archive, Deserialize, Serialize};

use super::{FieldType, Layout, StatInfo};
use crate::error::Error;
use crate::storage::{IndexFile, StorageEngine, Transaction};

/// Bytes of an index entry besides the key: slot flag plus row id.
const INDEX_ENTRY_OVERHEAD: usize = 4 + 8;

/// Persistent definition of a secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index name.
    pub name: String,
    /// Indexed table.
    pub table: String,
    /// Indexed field.
    pub field: String,
}

impl IndexDef {
    /// Create an index definition.
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            field: field.into(),
        }
    }

    /// Serialize for storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from storage.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// Planner-facing descriptor of an index on one table field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    def: IndexDef,
    layout: Layout,
    stats: StatInfo,
}

impl IndexInfo {
    /// Describe an index given the statistics of its table.
    pub fn new(def: IndexDef, field_type: FieldType, stats: StatInfo, block_size: usize) -> Self {
        let layout = Self::entry_layout(field_type, block_size);
        Self { def, layout, stats }
    }

    /// Layout of the entries of an index on a field of `field_type`.
    pub fn entry_layout(field_type: FieldType, block_size: usize) -> Layout {
        Layout::with_slot_size(INDEX_ENTRY_OVERHEAD + field_type.byte_len(), block_size)
    }

    /// Index name.
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Indexed table.
    pub fn table(&self) -> &str {
        &self.def.table
    }

    /// Indexed field.
    pub fn field(&self) -> &str {
        &self.def.field
    }

    /// Number of blocks holding index entries.
    pub fn index_blocks(&self) -> u64 {
        (self.stats.records_output() / self.layout.records_per_block()).max(1)
    }

    /// Blocks read to locate the leaf for one probe.
    ///
    /// This is the number of directory levels above the leaves, so a
    /// single-block index costs nothing beyond the leaf itself.
    pub fn blocks_accessed(&self) -> u64 {
        let fanout = self.layout.records_per_block().max(2);
        let blocks = self.index_blocks();
        let mut levels = 0;
        let mut reach = 1u64;
        while reach < blocks {
            reach = reach.saturating_mul(fanout);
            levels += 1;
        }
        levels
    }

    /// Estimated rows matching one probe value.
    pub fn records_output(&self) -> u64 {
        self.stats.records_output() / self.stats.distinct_values(&self.def.field)
    }

    /// Distinct values of a field among the rows one probe returns.
    pub fn distinct_values(&self, field: &str) -> u64 {
        if field == self.def.field {
            1
        } else {
            self.stats.distinct_values(field)
        }
    }

    /// Open the index file.
    pub fn open(&self, tx: &Transaction) -> Result<IndexFile, Error> {
        self.open_in(tx.engine())
    }

    pub(crate) fn open_in(&self, engine: &Arc<StorageEngine>) -> Result<IndexFile, Error> {
        engine.index_file(&self.def.name, self.layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn info(records: u64, distinct: u64) -> IndexInfo {
        let stats = StatInfo::new(
            records.div_ceil(33),
            records,
            HashMap::from([("y".to_string(), distinct), ("z".to_string(), records)]),
        );
        IndexInfo::new(IndexDef::new("iy", "b", "y"), FieldType::Int, stats, 400)
    }

    #[test]
    fn test_single_block_probe_is_free() {
        // 16-byte entries, 25 per block.
        let info = info(10, 10);
        assert_eq!(info.index_blocks(), 1);
        assert_eq!(info.blocks_accessed(), 0);
        assert_eq!(info.records_output(), 1);
    }

    #[test]
    fn test_probe_cost_grows_with_levels() {
        assert_eq!(info(100, 10).blocks_accessed(), 1);
        assert_eq!(info(25 * 25 * 2, 10).blocks_accessed(), 2);
    }

    #[test]
    fn test_distinct_values() {
        let info = info(100, 10);
        assert_eq!(info.distinct_values("y"), 1);
        assert_eq!(info.distinct_values("z"), 100);
    }

    #[test]
    fn test_def_bytes() {
        let def = IndexDef::new("smid", "student", "majorid");
        let bytes = def.to_bytes().unwrap();
        assert_eq!(IndexDef::from_bytes(&bytes).unwrap(), def);
    }
}
