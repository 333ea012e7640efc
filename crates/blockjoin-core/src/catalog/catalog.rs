//! Catalog manager for table and index metadata.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use rkyv::{Archive, Deserialize, Serialize};
use sled::Tree;
use tracing::{debug, info};

use super::{IndexDef, IndexInfo, Layout, Schema, StatInfo};
use crate::error::Error;
use crate::storage::{IndexFile, StorageEngine, TableFile};

/// Tree name for table definitions.
const TABLES_TREE: &str = "catalog:tables";

/// Tree name for index definitions.
const INDEXES_TREE: &str = "catalog:indexes";

/// Persistent definition of a table.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct TableDef {
    /// Table name.
    pub name: String,
    /// Table schema.
    pub schema: Schema,
}

impl TableDef {
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

/// The catalog: table schemas, index definitions and cached statistics.
pub struct Catalog {
    engine: Arc<StorageEngine>,
    tables_tree: Tree,
    indexes_tree: Tree,
    tables: RwLock<HashMap<String, TableDef>>,
    indexes: RwLock<BTreeMap<String, IndexDef>>,
    stats: RwLock<HashMap<String, StatInfo>>,
}

impl Catalog {
    /// Open or create the catalog stored in the engine's database.
    pub fn open(engine: Arc<StorageEngine>) -> Result<Self, Error> {
        let tables_tree = engine.db().open_tree(TABLES_TREE)?;
        let indexes_tree = engine.db().open_tree(INDEXES_TREE)?;

        let mut tables = HashMap::new();
        for entry in tables_tree.iter() {
            let (_, bytes) = entry?;
            let def = TableDef::from_bytes(&bytes)?;
            tables.insert(def.name.clone(), def);
        }

        let mut indexes = BTreeMap::new();
        for entry in indexes_tree.iter() {
            let (_, bytes) = entry?;
            let def = IndexDef::from_bytes(&bytes)?;
            indexes.insert(def.name.clone(), def);
        }

        debug!(
            tables = tables.len(),
            indexes = indexes.len(),
            "opened catalog"
        );

        Ok(Self {
            engine,
            tables_tree,
            indexes_tree,
            tables: RwLock::new(tables),
            indexes: RwLock::new(indexes),
            stats: RwLock::new(HashMap::new()),
        })
    }

    /// Register a new table.
    pub fn create_table(&self, name: &str, schema: Schema) -> Result<(), Error> {
        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            return Err(Error::DuplicateTable(name.to_string()));
        }
        let def = TableDef {
            name: name.to_string(),
            schema,
        };
        self.tables_tree.insert(name.as_bytes(), def.to_bytes()?)?;
        tables.insert(name.to_string(), def);
        info!(table = name, "created table");
        Ok(())
    }

    /// Names of all tables, sorted.
    pub fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Schema of a table.
    pub fn table_schema(&self, table: &str) -> Result<Schema, Error> {
        self.tables
            .read()
            .get(table)
            .map(|def| def.schema.clone())
            .ok_or_else(|| Error::UnknownTable(table.to_string()))
    }

    /// Record layout of a table.
    pub fn layout(&self, table: &str) -> Result<Layout, Error> {
        let schema = self.table_schema(table)?;
        Ok(Layout::new(&schema, self.engine.block_size()))
    }

    /// Row file of a table.
    pub fn table_file(&self, table: &str) -> Result<TableFile, Error> {
        let layout = self.layout(table)?;
        self.engine.table_file(table, layout)
    }

    /// Register an index and build entries for the rows already stored.
    pub fn create_index(&self, name: &str, table: &str, field: &str) -> Result<IndexDef, Error> {
        let schema = self.table_schema(table)?;
        let pos = schema
            .position(field)
            .ok_or_else(|| Error::UnknownField(field.to_string()))?;

        let mut indexes = self.indexes.write();
        if indexes.contains_key(name) {
            return Err(Error::DuplicateIndex(name.to_string()));
        }
        let def = IndexDef::new(name, table, field);

        let index = self.index_info(&def, &schema)?.open_in(&self.engine)?;
        let file = self.table_file(table)?;
        let mut built = 0u64;
        for entry in file.entries() {
            let (row_id, row) = entry?;
            if let Some(value) = row.get(pos) {
                index.insert(value, row_id)?;
                built += 1;
            }
        }

        self.indexes_tree.insert(name.as_bytes(), def.to_bytes()?)?;
        indexes.insert(name.to_string(), def.clone());
        info!(index = name, table, field, entries = built, "created index");
        Ok(def)
    }

    /// Definitions of every index on a table, ordered by index name.
    pub fn index_defs(&self, table: &str) -> Vec<IndexDef> {
        self.indexes
            .read()
            .values()
            .filter(|def| def.table == table)
            .cloned()
            .collect()
    }

    /// Indexes of a table keyed by indexed field.
    ///
    /// When several indexes cover one field the first by name is kept.
    pub fn indexes_for(&self, table: &str) -> Result<BTreeMap<String, IndexInfo>, Error> {
        let schema = self.table_schema(table)?;
        let mut result = BTreeMap::new();
        for def in self.index_defs(table) {
            if !result.contains_key(&def.field) {
                let info = self.index_info(&def, &schema)?;
                result.insert(def.field.clone(), info);
            }
        }
        Ok(result)
    }

    /// Open every index of a table, paired with the schema position of the
    /// indexed field.
    pub fn index_files(&self, table: &str) -> Result<Vec<(usize, IndexFile)>, Error> {
        let schema = self.table_schema(table)?;
        self.index_defs(table)
            .into_iter()
            .map(|def| {
                let (pos, field_type) = schema
                    .position(&def.field)
                    .zip(schema.field_type(&def.field))
                    .ok_or_else(|| Error::UnknownField(def.field.clone()))?;
                let layout = IndexInfo::entry_layout(field_type, self.engine.block_size());
                Ok((pos, self.engine.index_file(&def.name, layout)?))
            })
            .collect()
    }

    /// Statistics of a table, computed on first use and cached.
    pub fn stat_info(&self, table: &str) -> Result<StatInfo, Error> {
        if let Some(stats) = self.stats.read().get(table) {
            return Ok(stats.clone());
        }
        let schema = self.table_schema(table)?;
        let layout = Layout::new(&schema, self.engine.block_size());
        let file = self.engine.table_file(table, layout)?;
        let stats = StatInfo::compute(&file, &schema, layout)?;
        self.stats.write().insert(table.to_string(), stats.clone());
        Ok(stats)
    }

    /// Forget cached statistics after a table changed.
    pub fn invalidate_stats(&self, table: &str) {
        self.stats.write().remove(table);
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.tables_tree.flush()?;
        self.indexes_tree.flush()?;
        Ok(())
    }

    fn index_info(&self, def: &IndexDef, schema: &Schema) -> Result<IndexInfo, Error> {
        let field_type = schema
            .field_type(&def.field)
            .ok_or_else(|| Error::UnknownField(def.field.clone()))?;
        let stats = self.stat_info(&def.table)?;
        Ok(IndexInfo::new(
            def.clone(),
            field_type,
            stats,
            self.engine.block_size(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldDef;
    use crate::query::Constant;
    use crate::storage::StorageConfig;

    fn schema() -> Schema {
        Schema::new()
            .with_field(FieldDef::int("by"))
            .with_field(FieldDef::int("bz"))
    }

    #[test]
    fn test_create_and_lookup_table() {
        let engine = StorageEngine::open(StorageConfig::temporary()).unwrap();
        let catalog = Catalog::open(engine).unwrap();
        catalog.create_table("b", schema()).unwrap();

        assert_eq!(catalog.table_schema("b").unwrap(), schema());
        assert!(matches!(
            catalog.create_table("b", schema()),
            Err(Error::DuplicateTable(_))
        ));
        assert!(matches!(
            catalog.table_schema("nope"),
            Err(Error::UnknownTable(_))
        ));
        assert_eq!(catalog.list_tables(), vec!["b".to_string()]);
    }

    #[test]
    fn test_catalog_persists() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig::new(dir.path());
        {
            let engine = StorageEngine::open(config.clone()).unwrap();
            let catalog = Catalog::open(engine.clone()).unwrap();
            catalog.create_table("b", schema()).unwrap();
            catalog.create_index("iby", "b", "by").unwrap();
            catalog.flush().unwrap();
            engine.flush().unwrap();
        }

        let engine = StorageEngine::open(config).unwrap();
        let catalog = Catalog::open(engine).unwrap();
        assert_eq!(catalog.table_schema("b").unwrap(), schema());
        let indexes = catalog.indexes_for("b").unwrap();
        assert_eq!(indexes.keys().collect::<Vec<_>>(), vec!["by"]);
    }

    #[test]
    fn test_index_backfill_and_stats() {
        let engine = StorageEngine::open(StorageConfig::temporary()).unwrap();
        let catalog = Catalog::open(engine.clone()).unwrap();
        catalog.create_table("b", schema()).unwrap();
        let file = catalog.table_file("b").unwrap();
        for i in 0..10 {
            file.insert(&[Constant::Int(i % 5), Constant::Int(i)]).unwrap();
        }

        catalog.create_index("iby", "b", "by").unwrap();
        let indexes = catalog.indexes_for("b").unwrap();
        let info = &indexes["by"];
        assert_eq!(info.records_output(), 2);

        let tx = engine.begin();
        let index = info.open(&tx).unwrap();
        assert_eq!(index.lookup(&Constant::Int(3)).unwrap(), vec![3, 8]);

        let stats = catalog.stat_info("b").unwrap();
        assert_eq!(stats.records_output(), 10);
        assert_eq!(stats.distinct_values("by"), 5);
    }

    #[test]
    fn test_stats_invalidation() {
        let engine = StorageEngine::open(StorageConfig::temporary()).unwrap();
        let catalog = Catalog::open(engine).unwrap();
        catalog.create_table("b", schema()).unwrap();
        assert_eq!(catalog.stat_info("b").unwrap().records_output(), 0);

        let file = catalog.table_file("b").unwrap();
        file.insert(&[Constant::Int(1), Constant::Int(1)]).unwrap();
        assert_eq!(catalog.stat_info("b").unwrap().records_output(), 0);
        catalog.invalidate_stats("b");
        assert_eq!(catalog.stat_info("b").unwrap().records_output(), 1);
    }

    #[test]
    fn test_index_on_unknown_field() {
        let engine = StorageEngine::open(StorageConfig::temporary()).unwrap();
        let catalog = Catalog::open(engine).unwrap();
        catalog.create_table("b", schema()).unwrap();
        assert!(matches!(
            catalog.create_index("ix", "b", "nope"),
            Err(Error::UnknownField(_))
        ));
    }
}
