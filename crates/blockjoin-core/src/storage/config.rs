//! Storage configuration.

use std::path::PathBuf;

/// Default logical block size in bytes.
pub const DEFAULT_BLOCK_SIZE: usize = 400;

/// Default number of buffers in the pool.
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 8;

/// Configuration for the storage engine.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Path to the database directory.
    pub path: PathBuf,

    /// Page cache capacity in bytes for the underlying sled database.
    pub cache_capacity: u64,

    /// Enable zstd compression.
    pub compression: bool,

    /// Temporary database (deleted on drop).
    pub temporary: bool,

    /// Logical block size used for layout and cost estimates.
    pub block_size: usize,

    /// Number of block buffers available to a query.
    pub buffer_pool_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./blockjoin_data"),
            cache_capacity: 64 * 1024 * 1024, // 64MB
            compression: false,
            temporary: false,
            block_size: DEFAULT_BLOCK_SIZE,
            buffer_pool_size: DEFAULT_BUFFER_POOL_SIZE,
        }
    }
}

impl StorageConfig {
    /// Create a new configuration with the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Create a temporary in-memory configuration for testing.
    pub fn temporary() -> Self {
        Self {
            path: PathBuf::from(""),
            temporary: true,
            ..Default::default()
        }
    }

    /// Set the logical block size.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    /// Set the buffer pool size.
    pub fn with_buffer_pool_size(mut self, buffers: usize) -> Self {
        self.buffer_pool_size = buffers.max(1);
        self
    }

    /// Set the sled cache capacity.
    pub fn with_cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = bytes;
        self
    }

    /// Enable or disable compression.
    pub fn with_compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }

    /// Convert to sled configuration.
    pub(crate) fn to_sled_config(&self) -> sled::Config {
        let config = sled::Config::new()
            .cache_capacity(self.cache_capacity)
            .use_compression(self.compression);

        if self.temporary {
            config.temporary(true)
        } else {
            config.path(&self.path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.block_size, 400);
        assert_eq!(config.buffer_pool_size, 8);
        assert!(!config.temporary);
    }

    #[test]
    fn test_builder() {
        let config = StorageConfig::temporary()
            .with_block_size(1024)
            .with_buffer_pool_size(0);
        assert!(config.temporary);
        assert_eq!(config.block_size, 1024);
        // A pool always has at least one buffer.
        assert_eq!(config.buffer_pool_size, 1);
    }
}
