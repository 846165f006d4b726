//! How execution and storage share a mode's memory.

use std::fmt;

use teramem_common::config::SharingPolicyKind;
use teramem_common::types::MemoryMode;
use tracing::debug;

use super::execution::ExecutionMemoryPool;
use super::storage::StorageMemoryPool;

/// The execution and storage pools of one memory mode.
#[derive(Debug)]
pub struct ModePools {
    /// Execution pool.
    pub execution: ExecutionMemoryPool,
    /// Storage pool.
    pub storage: StorageMemoryPool,
    /// Storage bytes execution may not reclaim by eviction.
    pub storage_region: u64,
}

impl ModePools {
    /// Creates both pools with their initial sizes. The initial storage
    /// size is the protected storage region.
    #[must_use]
    pub fn new(mode: MemoryMode, execution_size: u64, storage_size: u64) -> Self {
        Self {
            execution: ExecutionMemoryPool::new(mode, execution_size),
            storage: StorageMemoryPool::new(mode, storage_size),
            storage_region: storage_size,
        }
    }

    /// Combined capacity of both pools.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.execution.pool_size().saturating_add(self.storage.pool_size())
    }
}

/// Sharing strategy between the execution and storage pools of one mode.
///
/// All methods run under the manager's lock, so implementations may move
/// capacity between the two pools freely as long as `used <= pool_size`
/// holds for both when they return.
pub trait SharingPolicy: Send + Sync + fmt::Debug {
    /// Short name for logs and stats.
    fn name(&self) -> &'static str;

    /// Largest storage request that could ever succeed right now.
    fn max_storage_memory(&self, pools: &ModePools) -> u64;

    /// Largest the execution pool could become, for the per-task ceiling.
    fn max_execution_pool_size(&self, pools: &ModePools) -> u64;

    /// Gives execution up to `shortfall` more capacity, if the policy allows.
    fn grow_execution_pool(&self, pools: &mut ModePools, shortfall: u64);

    /// Makes room in the storage pool for a `num_bytes` request, if the
    /// policy allows borrowing.
    fn borrow_for_storage(&self, pools: &mut ModePools, num_bytes: u64);
}

/// Fixed split: each pool keeps its configured capacity.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPartition;

impl SharingPolicy for StaticPartition {
    fn name(&self) -> &'static str {
        "static"
    }

    fn max_storage_memory(&self, pools: &ModePools) -> u64 {
        pools.storage.pool_size()
    }

    fn max_execution_pool_size(&self, pools: &ModePools) -> u64 {
        pools.execution.pool_size()
    }

    fn grow_execution_pool(&self, _pools: &mut ModePools, _shortfall: u64) {}

    fn borrow_for_storage(&self, _pools: &mut ModePools, _num_bytes: u64) {}
}

/// Soft boundary between execution and storage.
///
/// Storage may borrow any free execution memory. Execution may take back
/// free storage memory and evict cached blocks, but only down to the
/// protected storage region. Execution memory is never evicted.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnifiedSharing;

impl SharingPolicy for UnifiedSharing {
    fn name(&self) -> &'static str {
        "unified"
    }

    fn max_storage_memory(&self, pools: &ModePools) -> u64 {
        pools.total() - pools.execution.memory_used()
    }

    fn max_execution_pool_size(&self, pools: &ModePools) -> u64 {
        pools.total() - pools.storage.memory_used().min(pools.storage_region)
    }

    fn grow_execution_pool(&self, pools: &mut ModePools, shortfall: u64) {
        if shortfall == 0 {
            return;
        }
        let reclaimable = pools.storage.memory_free().max(
            pools
                .storage
                .pool_size()
                .saturating_sub(pools.storage_region),
        );
        if reclaimable == 0 {
            return;
        }
        let freed = pools
            .storage
            .free_space_to_shrink_pool(shortfall.min(reclaimable));
        let moved = pools.storage.decrease_pool_size(freed);
        pools.execution.increase_pool_size(moved);
        debug!(
            "Moved {} bytes of {} storage capacity to execution",
            moved,
            pools.storage.pool().mode()
        );
    }

    fn borrow_for_storage(&self, pools: &mut ModePools, num_bytes: u64) {
        let storage_free = pools.storage.memory_free();
        if num_bytes <= storage_free {
            return;
        }
        let borrowed = pools
            .execution
            .memory_free()
            .min(num_bytes - storage_free);
        let moved = pools.execution.decrease_pool_size(borrowed);
        pools.storage.increase_pool_size(moved);
    }
}

/// Builds the policy named by configuration.
#[must_use]
pub fn policy_for(kind: SharingPolicyKind) -> Box<dyn SharingPolicy> {
    match kind {
        SharingPolicyKind::StaticPartition => Box::new(StaticPartition),
        SharingPolicyKind::Unified => Box::new(UnifiedSharing),
    }
}
