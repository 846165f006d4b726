//! Capacity-tracked byte counter shared by execution and storage pools.

use teramem_common::types::{MemoryMode, PoolCategory};
use tracing::warn;

/// Bytes available and used for one (mode, category) pair.
///
/// Holds `memory_used <= pool_size` at all times. Not synchronized: every
/// pool lives inside the manager's lock.
#[derive(Debug, Clone)]
pub struct MemoryPool {
    mode: MemoryMode,
    category: PoolCategory,
    pool_size: u64,
    memory_used: u64,
}

impl MemoryPool {
    /// Creates an empty pool of the given capacity.
    #[must_use]
    pub fn new(mode: MemoryMode, category: PoolCategory, pool_size: u64) -> Self {
        Self {
            mode,
            category,
            pool_size,
            memory_used: 0,
        }
    }

    /// Memory mode of this pool.
    #[must_use]
    pub fn mode(&self) -> MemoryMode {
        self.mode
    }

    /// Category of this pool.
    #[must_use]
    pub fn category(&self) -> PoolCategory {
        self.category
    }

    /// Current capacity in bytes.
    #[must_use]
    pub fn pool_size(&self) -> u64 {
        self.pool_size
    }

    /// Bytes currently in use.
    #[must_use]
    pub fn memory_used(&self) -> u64 {
        self.memory_used
    }

    /// Bytes not in use.
    #[must_use]
    pub fn memory_free(&self) -> u64 {
        self.pool_size - self.memory_used
    }

    /// Grows capacity. Used bytes are untouched.
    pub fn increase_pool_size(&mut self, delta: u64) {
        self.pool_size = self.pool_size.saturating_add(delta);
    }

    /// Shrinks capacity by up to `delta`, never below what is in use.
    ///
    /// Returns the amount actually removed.
    pub fn decrease_pool_size(&mut self, delta: u64) -> u64 {
        let free = self.memory_free();
        let removed = delta.min(free);
        if removed < delta {
            warn!(
                "Cannot shrink {} {} pool by {} bytes; only {} bytes are free",
                self.mode, self.category, delta, free
            );
        }
        self.pool_size -= removed;
        removed
    }

    /// Marks `bytes` as used. Callers check free space first.
    pub(crate) fn reserve(&mut self, bytes: u64) {
        debug_assert!(bytes <= self.memory_free());
        self.memory_used += bytes.min(self.memory_free());
    }

    /// Returns up to `bytes` to the pool, clamping at zero.
    ///
    /// Returns the amount actually released.
    pub(crate) fn unreserve(&mut self, bytes: u64) -> u64 {
        let released = bytes.min(self.memory_used);
        self.memory_used -= released;
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(size: u64) -> MemoryPool {
        MemoryPool::new(MemoryMode::OnHeap, PoolCategory::Execution, size)
    }

    #[test]
    fn test_resize_leaves_used_alone() {
        let mut p = pool(100);
        p.reserve(40);
        p.increase_pool_size(50);
        assert_eq!(p.pool_size(), 150);
        assert_eq!(p.memory_used(), 40);
        assert_eq!(p.memory_free(), 110);
    }

    #[test]
    fn test_shrink_clamps_to_free() {
        let mut p = pool(100);
        p.reserve(70);
        assert_eq!(p.decrease_pool_size(50), 30);
        assert_eq!(p.pool_size(), 70);
        assert_eq!(p.memory_free(), 0);
    }

    #[test]
    fn test_unreserve_clamps_at_zero() {
        let mut p = pool(100);
        p.reserve(10);
        assert_eq!(p.unreserve(25), 10);
        assert_eq!(p.memory_used(), 0);
        assert_eq!(p.unreserve(5), 0);
    }
}
