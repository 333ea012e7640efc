//! Row files and the table scan.
//!
//! A table file is a sled tree keyed by dense big-endian row ids. Row `i`
//! lives in logical block `i / records_per_block`; cursors pin that block
//! with the buffer monitor whenever they cross into it.

use std::sync::Arc;

use sled::Tree;

use super::buffer::BlockId;
use super::codec::{decode_row, encode_row};
use super::{StorageEngine, TempTable};
use crate::catalog::{Layout, Schema};
use crate::error::Error;
use crate::query::{Constant, Scan};

/// Handle to the stored rows of one table or temporary table.
#[derive(Clone)]
pub struct TableFile {
    engine: Arc<StorageEngine>,
    name: String,
    file_id: u64,
    tree: Tree,
    layout: Layout,
}

impl TableFile {
    pub(crate) fn new(
        engine: Arc<StorageEngine>,
        name: String,
        file_id: u64,
        tree: Tree,
        layout: Layout,
    ) -> Self {
        Self {
            engine,
            name,
            file_id,
            tree,
            layout,
        }
    }

    /// Name of the backing tree.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Numeric id used in block ids.
    pub fn file_id(&self) -> u64 {
        self.file_id
    }

    /// Record layout of the file.
    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub(crate) fn engine(&self) -> &Arc<StorageEngine> {
        &self.engine
    }

    /// Append a row and return its id.
    pub fn insert(&self, values: &[Constant]) -> Result<u64, Error> {
        let row_id = self.row_count()?;
        self.pin(row_id);
        self.tree.insert(row_id.to_be_bytes(), encode_row(values)?)?;
        Ok(row_id)
    }

    /// Number of rows stored.
    pub fn row_count(&self) -> Result<u64, Error> {
        match self.tree.last()? {
            Some((key, _)) => Ok(decode_row_id(&key)? + 1),
            None => Ok(0),
        }
    }

    /// Number of logical blocks the rows occupy.
    pub fn block_count(&self) -> Result<u64, Error> {
        Ok(self.layout.blocks_for(self.row_count()?))
    }

    /// Fetch one row by id.
    pub fn get(&self, row_id: u64) -> Result<Option<Vec<Constant>>, Error> {
        self.pin(row_id);
        match self.tree.get(row_id.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode_row(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Iterate over stored rows without reporting block accesses.
    ///
    /// Used for maintenance work (statistics, index builds) that should not
    /// show up in query buffer counters.
    pub fn rows(&self) -> impl Iterator<Item = Result<Vec<Constant>, Error>> + '_ {
        self.tree.iter().map(|entry| {
            let (_, value) = entry?;
            decode_row(&value)
        })
    }

    /// Iterate over `(row_id, row)` pairs without reporting block accesses.
    pub fn entries(&self) -> impl Iterator<Item = Result<(u64, Vec<Constant>), Error>> + '_ {
        self.tree.iter().map(|entry| {
            let (key, value) = entry?;
            Ok((decode_row_id(&key)?, decode_row(&value)?))
        })
    }

    /// Open a scan over every row.
    pub fn scan(&self, schema: Schema) -> TableScan {
        TableScan::new(self.clone(), schema, None)
    }

    fn block_of(&self, row_id: u64) -> u64 {
        row_id / self.layout.records_per_block()
    }

    fn pin(&self, row_id: u64) {
        self.engine
            .buffers()
            .pin(BlockId::new(self.file_id, self.block_of(row_id)));
    }
}

fn decode_row_id(key: &[u8]) -> Result<u64, Error> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| Error::InvalidData("Invalid row id key".into()))?;
    Ok(u64::from_be_bytes(bytes))
}

/// Sequential scan over a table file.
pub struct TableScan {
    file: TableFile,
    schema: Schema,
    iter: Option<sled::Iter>,
    current: Option<(u64, Vec<Constant>)>,
    current_block: Option<u64>,
    // Keeps a temporary table alive for as long as it is being read.
    _temp: Option<Arc<TempTable>>,
}

impl TableScan {
    pub(crate) fn new(file: TableFile, schema: Schema, temp: Option<Arc<TempTable>>) -> Self {
        Self {
            file,
            schema,
            iter: None,
            current: None,
            current_block: None,
            _temp: temp,
        }
    }

    /// Schema of the rows.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Id of the current row, if positioned on one.
    pub fn position(&self) -> Option<u64> {
        self.current.as_ref().map(|(id, _)| *id)
    }

    /// Reposition on a previously seen row.
    ///
    /// Returns `false` if the row does not exist.
    pub fn restore(&mut self, row_id: u64) -> Result<bool, Error> {
        self.iter = Some(self.file.tree.range(row_id.to_be_bytes()..));
        self.current = None;
        self.next()
    }

    fn enter_block(&mut self, row_id: u64) {
        let block = self.file.block_of(row_id);
        if self.current_block != Some(block) {
            self.file.pin(row_id);
            self.current_block = Some(block);
        }
    }
}

impl Scan for TableScan {
    fn before_first(&mut self) -> Result<(), Error> {
        self.iter = Some(self.file.tree.iter());
        self.current = None;
        self.current_block = None;
        Ok(())
    }

    fn next(&mut self) -> Result<bool, Error> {
        if self.iter.is_none() {
            self.before_first()?;
        }
        let entry = match self.iter.as_mut().and_then(|it| it.next()) {
            Some(entry) => entry?,
            None => {
                self.current = None;
                return Ok(false);
            }
        };
        let (key, value) = entry;
        let row_id = decode_row_id(&key)?;
        self.enter_block(row_id);
        self.current = Some((row_id, decode_row(&value)?));
        Ok(true)
    }

    fn get_val(&self, field: &str) -> Result<Constant, Error> {
        let pos = self
            .schema
            .position(field)
            .ok_or_else(|| Error::UnknownField(field.to_string()))?;
        let (_, row) = self
            .current
            .as_ref()
            .ok_or_else(|| Error::InvalidData("scan is not positioned on a row".into()))?;
        row.get(pos)
            .cloned()
            .ok_or_else(|| Error::InvalidData(format!("row is missing field '{}'", field)))
    }

    fn has_field(&self, field: &str) -> bool {
        self.schema.has_field(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldDef;
    use crate::storage::StorageConfig;

    fn setup(rows: i32) -> (Arc<StorageEngine>, TableFile, Schema) {
        let engine = StorageEngine::open(StorageConfig::temporary()).unwrap();
        let schema = Schema::new()
            .with_field(FieldDef::int("x"))
            .with_field(FieldDef::int("y"));
        let layout = Layout::new(&schema, 400);
        let file = engine.table_file("t", layout).unwrap();
        for i in 0..rows {
            file.insert(&[Constant::Int(i), Constant::Int(i * 10)]).unwrap();
        }
        (engine, file, schema)
    }

    #[test]
    fn test_insert_and_get() {
        let (_engine, file, _) = setup(3);
        assert_eq!(file.row_count().unwrap(), 3);
        assert_eq!(
            file.get(1).unwrap(),
            Some(vec![Constant::Int(1), Constant::Int(10)])
        );
        assert_eq!(file.get(9).unwrap(), None);
    }

    #[test]
    fn test_scan_in_insert_order() {
        let (_engine, file, schema) = setup(50);
        let mut scan = file.scan(schema);
        scan.before_first().unwrap();
        let mut xs = Vec::new();
        while scan.next().unwrap() {
            xs.push(scan.get_int("x").unwrap());
        }
        assert_eq!(xs, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_scan_pins_each_block_once() {
        // 12-byte slots, 33 rows per block: 100 rows span 4 blocks.
        let (engine, file, schema) = setup(100);
        assert_eq!(file.block_count().unwrap(), 4);
        engine.buffers().reset();

        let mut scan = file.scan(schema);
        scan.before_first().unwrap();
        while scan.next().unwrap() {}
        assert_eq!(engine.buffer_stats().accesses(), 4);
    }

    #[test]
    fn test_restore_position() {
        let (_engine, file, schema) = setup(10);
        let mut scan = file.scan(schema);
        scan.before_first().unwrap();
        scan.next().unwrap();
        scan.next().unwrap();
        let saved = scan.position().unwrap();
        scan.next().unwrap();
        scan.next().unwrap();

        assert!(scan.restore(saved).unwrap());
        assert_eq!(scan.get_int("x").unwrap(), 1);
        assert!(scan.next().unwrap());
        assert_eq!(scan.get_int("x").unwrap(), 2);
    }
}
