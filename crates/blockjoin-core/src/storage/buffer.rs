//! Buffer residency tracking.
//!
//! Cursors report every block they enter. The monitor keeps an LRU set of
//! resident blocks the size of the buffer pool and counts hits and misses.
//! The counters describe actual execution only; cost estimation never reads
//! them.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Identifies one block of one stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId {
    /// File (table, index or temp table) the block belongs to.
    pub file: u64,
    /// Block number within the file.
    pub number: u64,
}

impl BlockId {
    /// Create a block id.
    pub fn new(file: u64, number: u64) -> Self {
        Self { file, number }
    }
}

/// Snapshot of the buffer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Blocks found resident.
    pub hits: u64,
    /// Blocks read from storage.
    pub misses: u64,
}

impl BufferStats {
    /// Total block accesses.
    pub fn accesses(&self) -> u64 {
        self.hits + self.misses
    }
}

/// LRU residency set with hit/miss counters.
pub struct BufferMonitor {
    capacity: usize,
    resident: Mutex<VecDeque<BlockId>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl BufferMonitor {
    /// Create a monitor for a pool of `capacity` buffers.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            resident: Mutex::new(VecDeque::with_capacity(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Number of buffers in the pool.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record an access to a block.
    pub fn pin(&self, block: BlockId) {
        let mut resident = self.resident.lock();
        if let Some(pos) = resident.iter().position(|b| *b == block) {
            resident.remove(pos);
            resident.push_back(block);
            self.hits.fetch_add(1, Ordering::Relaxed);
            return;
        }

        if resident.len() == self.capacity {
            resident.pop_front();
        }
        resident.push_back(block);
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop every resident block of a file (used when a temp table goes away).
    pub fn evict_file(&self, file: u64) {
        self.resident.lock().retain(|b| b.file != file);
    }

    /// Current counter values.
    pub fn stats(&self) -> BufferStats {
        BufferStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Reset counters and residency.
    pub fn reset(&self) {
        self.resident.lock().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_and_miss() {
        let monitor = BufferMonitor::new(2);
        monitor.pin(BlockId::new(1, 0));
        monitor.pin(BlockId::new(1, 0));
        monitor.pin(BlockId::new(1, 1));

        let stats = monitor.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.accesses(), 3);
    }

    #[test]
    fn test_lru_eviction() {
        let monitor = BufferMonitor::new(2);
        monitor.pin(BlockId::new(1, 0));
        monitor.pin(BlockId::new(1, 1));
        // Touch block 0 so block 1 becomes least recently used.
        monitor.pin(BlockId::new(1, 0));
        monitor.pin(BlockId::new(1, 2));
        monitor.pin(BlockId::new(1, 1));

        let stats = monitor.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 4);
    }

    #[test]
    fn test_evict_file_and_reset() {
        let monitor = BufferMonitor::new(4);
        monitor.pin(BlockId::new(7, 0));
        monitor.evict_file(7);
        monitor.pin(BlockId::new(7, 0));
        assert_eq!(monitor.stats().misses, 2);

        monitor.reset();
        assert_eq!(monitor.stats(), BufferStats::default());
    }
}
