//! Point-in-time memory usage snapshots.

use serde::Serialize;
use teramem_common::types::{MemoryMode, PoolCategory};

/// Counters of one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Memory mode.
    pub mode: MemoryMode,
    /// Pool category.
    pub category: PoolCategory,
    /// Capacity in bytes.
    pub pool_size: u64,
    /// Bytes in use.
    pub memory_used: u64,
    /// Active tasks (execution pools only).
    pub active_tasks: usize,
    /// Tasks blocked below their fair share (execution pools only).
    pub waiting_tasks: usize,
    /// Cumulative bytes granted to cached blocks (storage pools only).
    pub storage_bytes_granted: u64,
    /// Cumulative bytes granted for unrolling (storage pools only).
    pub unroll_bytes_granted: u64,
}

impl PoolStats {
    /// Bytes not in use.
    #[must_use]
    pub fn memory_free(&self) -> u64 {
        self.pool_size - self.memory_used
    }
}

/// Snapshot of all six pools, taken under the manager's lock.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryStats {
    /// Default mode for engine buffers.
    pub default_mode: MemoryMode,
    /// Page size for engine buffers.
    pub page_size: u64,
    /// Sharing policy name.
    pub policy: &'static str,
    /// Per-pool counters, execution then storage for each mode.
    pub pools: Vec<PoolStats>,
}

impl MemoryStats {
    /// Counters for one pool.
    #[must_use]
    pub fn pool(&self, mode: MemoryMode, category: PoolCategory) -> Option<&PoolStats> {
        self.pools
            .iter()
            .find(|p| p.mode == mode && p.category == category)
    }

    /// Total bytes in use across all pools.
    #[must_use]
    pub fn total_used(&self) -> u64 {
        self.pools.iter().map(|p| p.memory_used).sum()
    }
}
