//! Least-recently-used block cache.

use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use parking_lot::Mutex;
use teramem_common::types::{BlockId, MemoryMode};
use teramem_core::memory::BlockEvictor;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct CachedBlock {
    size: u64,
    mode: MemoryMode,
}

/// Eviction counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Blocks currently cached.
    pub blocks: usize,
    /// Blocks evicted since creation.
    pub evicted_blocks: u64,
    /// Bytes evicted since creation.
    pub evicted_bytes: u64,
}

/// Tracks cached blocks in recency order and evicts the oldest ones on
/// request.
///
/// The cache only tracks sizes: storage memory for a block must already be
/// acquired from the manager before [`insert`](Self::insert), and released
/// to it after [`remove`](Self::remove). Evicted blocks are accounted for
/// by the storage pool that asked for the eviction.
#[derive(Debug, Default)]
pub struct LruBlockCache {
    /// Oldest first.
    entries: Mutex<IndexMap<BlockId, CachedBlock, ahash::RandomState>>,
    evicted_blocks: AtomicU64,
    evicted_bytes: AtomicU64,
}

impl LruBlockCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a block as the most recently used.
    ///
    /// Replacing an existing block returns its old size and mode. The caller
    /// owns the storage memory of the replaced entry and must release it.
    pub fn insert(&self, block: BlockId, size: u64, mode: MemoryMode) -> Option<(u64, MemoryMode)> {
        let mut entries = self.entries.lock();
        let old = entries.shift_remove(&block).map(|b| (b.size, b.mode));
        entries.insert(block, CachedBlock { size, mode });
        old
    }

    /// Marks a block as the most recently used. Returns false if unknown.
    pub fn touch(&self, block: &BlockId) -> bool {
        let mut entries = self.entries.lock();
        match entries.get_index_of(block) {
            Some(index) => {
                let last = entries.len() - 1;
                entries.move_index(index, last);
                true
            }
            None => false,
        }
    }

    /// Drops a block, returning its size.
    pub fn remove(&self, block: &BlockId) -> Option<u64> {
        self.remove_entry(block).map(|(size, _)| size)
    }

    /// Drops a block, returning its size and the mode it was cached in.
    pub fn remove_entry(&self, block: &BlockId) -> Option<(u64, MemoryMode)> {
        self.entries
            .lock()
            .shift_remove(block)
            .map(|b| (b.size, b.mode))
    }

    /// Returns true if the block is cached.
    #[must_use]
    pub fn contains(&self, block: &BlockId) -> bool {
        self.entries.lock().contains_key(block)
    }

    /// Size of a cached block. Does not refresh recency.
    #[must_use]
    pub fn get(&self, block: &BlockId) -> Option<u64> {
        self.entries.lock().get(block).map(|b| b.size)
    }

    /// Number of cached blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Bytes cached in `mode`.
    #[must_use]
    pub fn bytes_cached(&self, mode: MemoryMode) -> u64 {
        self.entries
            .lock()
            .values()
            .filter(|b| b.mode == mode)
            .map(|b| b.size)
            .sum()
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            blocks: self.len(),
            evicted_blocks: self.evicted_blocks.load(Ordering::Relaxed),
            evicted_bytes: self.evicted_bytes.load(Ordering::Relaxed),
        }
    }
}

impl BlockEvictor for LruBlockCache {
    fn evict_blocks_to_free_space(
        &self,
        requesting: Option<&BlockId>,
        space: u64,
        mode: MemoryMode,
    ) -> u64 {
        let mut entries = self.entries.lock();

        let mut selected = Vec::new();
        let mut freed = 0u64;
        for (id, block) in entries.iter() {
            if freed >= space {
                break;
            }
            if block.mode != mode || requesting == Some(id) {
                continue;
            }
            selected.push(id.clone());
            freed += block.size;
        }

        if freed < space {
            debug!(
                "Cannot free {} bytes of {} storage; only {} bytes are evictable",
                space, mode, freed
            );
            return 0;
        }

        for id in &selected {
            entries.shift_remove(id);
        }
        self.evicted_blocks
            .fetch_add(selected.len() as u64, Ordering::Relaxed);
        self.evicted_bytes.fetch_add(freed, Ordering::Relaxed);
        debug!(
            "Evicted {} blocks ({} bytes) of {} storage",
            selected.len(),
            freed,
            mode
        );
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(name: &str) -> BlockId {
        BlockId::new(name)
    }

    #[test]
    fn test_evicts_oldest_first() {
        let cache = LruBlockCache::new();
        cache.insert(block("a"), 100, MemoryMode::OnHeap);
        cache.insert(block("b"), 100, MemoryMode::OnHeap);
        cache.insert(block("c"), 100, MemoryMode::OnHeap);

        assert_eq!(
            cache.evict_blocks_to_free_space(None, 150, MemoryMode::OnHeap),
            200
        );
        assert!(!cache.contains(&block("a")));
        assert!(!cache.contains(&block("b")));
        assert!(cache.contains(&block("c")));
        assert_eq!(cache.stats().evicted_blocks, 2);
    }

    #[test]
    fn test_touch_refreshes_recency() {
        let cache = LruBlockCache::new();
        cache.insert(block("a"), 100, MemoryMode::OnHeap);
        cache.insert(block("b"), 100, MemoryMode::OnHeap);
        assert!(cache.touch(&block("a")));

        cache.evict_blocks_to_free_space(None, 100, MemoryMode::OnHeap);
        assert!(cache.contains(&block("a")));
        assert!(!cache.contains(&block("b")));
        assert!(!cache.touch(&block("b")));
    }

    #[test]
    fn test_skips_requesting_block_and_other_modes() {
        let cache = LruBlockCache::new();
        cache.insert(block("off"), 500, MemoryMode::OffHeap);
        cache.insert(block("self"), 500, MemoryMode::OnHeap);
        cache.insert(block("victim"), 50, MemoryMode::OnHeap);

        let freed =
            cache.evict_blocks_to_free_space(Some(&block("self")), 50, MemoryMode::OnHeap);
        assert_eq!(freed, 50);
        assert!(cache.contains(&block("off")));
        assert!(cache.contains(&block("self")));
        assert!(!cache.contains(&block("victim")));
    }

    #[test]
    fn test_insufficient_space_evicts_nothing() {
        let cache = LruBlockCache::new();
        cache.insert(block("a"), 10, MemoryMode::OnHeap);
        cache.insert(block("b"), 10, MemoryMode::OnHeap);

        assert_eq!(
            cache.evict_blocks_to_free_space(None, 100, MemoryMode::OnHeap),
            0
        );
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evicted_bytes, 0);
    }

    #[test]
    fn test_insert_replaces_and_remove() {
        let cache = LruBlockCache::new();
        assert_eq!(cache.insert(block("a"), 10, MemoryMode::OnHeap), None);
        assert_eq!(
            cache.insert(block("a"), 30, MemoryMode::OffHeap),
            Some((10, MemoryMode::OnHeap))
        );
        assert_eq!(cache.bytes_cached(MemoryMode::OnHeap), 0);
        assert_eq!(cache.bytes_cached(MemoryMode::OffHeap), 30);
        assert_eq!(cache.remove(&block("a")), Some(30));
        assert!(cache.is_empty());
    }
}
