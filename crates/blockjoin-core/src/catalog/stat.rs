//! Table statistics used by the cost model.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::{Layout, Schema};
use crate::error::Error;
use crate::query::Constant;
use crate::storage::TableFile;

/// Block count, row count and per-field distinct-value counts of a table.
///
/// Distinct counts are at least 1 so they can always be used as divisors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatInfo {
    num_blocks: u64,
    num_records: u64,
    distinct: HashMap<String, u64>,
}

impl StatInfo {
    /// Create statistics from known values.
    pub fn new(num_blocks: u64, num_records: u64, distinct: HashMap<String, u64>) -> Self {
        let distinct = distinct.into_iter().map(|(k, v)| (k, v.max(1))).collect();
        Self {
            num_blocks,
            num_records,
            distinct,
        }
    }

    /// Scan a table file and compute its statistics.
    pub fn compute(file: &TableFile, schema: &Schema, layout: Layout) -> Result<Self, Error> {
        let names: Vec<&str> = schema.fields().collect();
        let mut seen: Vec<HashSet<Constant>> = vec![HashSet::new(); names.len()];
        let mut num_records = 0u64;

        for row in file.rows() {
            let row = row?;
            num_records += 1;
            for (set, value) in seen.iter_mut().zip(row) {
                set.insert(value);
            }
        }

        let distinct = names
            .iter()
            .zip(&seen)
            .map(|(name, set)| (name.to_string(), set.len() as u64))
            .collect();
        let stats = Self::new(layout.blocks_for(num_records), num_records, distinct);
        debug!(
            file = %file.name(),
            records = stats.num_records,
            blocks = stats.num_blocks,
            "computed table statistics"
        );
        Ok(stats)
    }

    /// Estimated number of blocks in the table.
    pub fn blocks_accessed(&self) -> u64 {
        self.num_blocks
    }

    /// Estimated number of records in the table.
    pub fn records_output(&self) -> u64 {
        self.num_records
    }

    /// Estimated number of distinct values of a field.
    ///
    /// Fields without a recorded count are guessed at a third of the rows.
    pub fn distinct_values(&self, field: &str) -> u64 {
        self.distinct
            .get(field)
            .copied()
            .unwrap_or(1 + self.num_records / 3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldDef;
    use crate::storage::{StorageConfig, StorageEngine};

    #[test]
    fn test_compute() {
        let engine = StorageEngine::open(StorageConfig::temporary()).unwrap();
        let schema = Schema::new()
            .with_field(FieldDef::int("x"))
            .with_field(FieldDef::int("y"));
        let layout = Layout::new(&schema, 400);
        let file = engine.table_file("a", layout).unwrap();
        for i in 0..100 {
            file.insert(&[Constant::Int(i), Constant::Int(i % 10)]).unwrap();
        }

        let stats = StatInfo::compute(&file, &schema, layout).unwrap();
        assert_eq!(stats.records_output(), 100);
        assert_eq!(stats.blocks_accessed(), 4);
        assert_eq!(stats.distinct_values("x"), 100);
        assert_eq!(stats.distinct_values("y"), 10);
    }

    #[test]
    fn test_empty_table_has_unit_distincts() {
        let stats = StatInfo::new(0, 0, HashMap::from([("x".to_string(), 0)]));
        assert_eq!(stats.distinct_values("x"), 1);
        assert_eq!(stats.distinct_values("missing"), 1);
    }
}
