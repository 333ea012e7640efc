//! Storage layer.
//!
//! Tables, secondary indexes and temporary tables are sled trees. Every
//! cursor reports the logical blocks it touches to a shared buffer monitor,
//! which keeps the hit/miss counters reported after a query runs.

mod buffer;
mod config;
mod engine;
mod index;
mod table;
mod temp;
mod transaction;

pub mod codec;

pub use buffer::{BlockId, BufferMonitor, BufferStats};
pub use config::{StorageConfig, DEFAULT_BLOCK_SIZE, DEFAULT_BUFFER_POOL_SIZE};
pub use engine::{StorageEngine, INDEX_TREE_PREFIX, TABLE_TREE_PREFIX, TEMP_TREE_PREFIX};
pub use index::IndexFile;
pub use table::{TableFile, TableScan};
pub use temp::TempTable;
pub use transaction::Transaction;
