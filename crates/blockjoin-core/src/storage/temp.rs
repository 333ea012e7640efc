//! Temporary tables used by materialization and sorting.

use std::sync::Arc;

use tracing::warn;

use super::{TableFile, TableScan};
use crate::catalog::Schema;
use crate::error::Error;
use crate::query::Constant;

/// A table that exists only for the lifetime of a query.
///
/// The backing tree is removed when the last handle is dropped.
pub struct TempTable {
    file: TableFile,
    schema: Schema,
}

impl TempTable {
    pub(crate) fn new(file: TableFile, schema: Schema) -> Self {
        Self { file, schema }
    }

    /// Name of the backing tree.
    pub fn name(&self) -> &str {
        self.file.name()
    }

    /// Schema of the stored rows.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The underlying row file.
    pub fn file(&self) -> &TableFile {
        &self.file
    }

    /// Append a row.
    pub fn insert(&self, values: &[Constant]) -> Result<u64, Error> {
        self.file.insert(values)
    }

    /// Open a scan that keeps the table alive while it runs.
    pub fn open(self: &Arc<Self>) -> TableScan {
        TableScan::new(
            self.file.clone(),
            self.schema.clone(),
            Some(Arc::clone(self)),
        )
    }
}

impl Drop for TempTable {
    fn drop(&mut self) {
        if let Err(e) = self.file.engine().drop_file(self.file.name()) {
            warn!(temp = %self.file.name(), error = %e, "failed to drop temporary table");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldDef;
    use crate::query::Scan;
    use crate::storage::{StorageConfig, StorageEngine};

    #[test]
    fn test_dropped_with_last_scan() {
        let engine = StorageEngine::open(StorageConfig::temporary()).unwrap();
        let tx = engine.begin();
        let schema = Schema::new().with_field(FieldDef::int("a"));
        let temp = Arc::new(tx.create_temp_table(schema).unwrap());
        temp.insert(&[Constant::Int(7)]).unwrap();
        let name = temp.name().to_string();

        let mut scan = temp.open();
        drop(temp);
        scan.before_first().unwrap();
        assert!(scan.next().unwrap());
        assert_eq!(scan.get_int("a").unwrap(), 7);

        let exists = |engine: &StorageEngine| {
            engine
                .db()
                .tree_names()
                .iter()
                .any(|n| n.as_ref() == name.as_bytes())
        };
        assert!(exists(&engine));
        drop(scan);
        assert!(!exists(&engine));
    }
}
