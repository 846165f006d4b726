//! Storage memory backed by an evictable block cache.

use std::fmt;
use std::sync::{Arc, Weak};

use teramem_common::types::{BlockId, MemoryMode, PoolCategory};
use tracing::{debug, warn};

use super::pool::MemoryPool;

/// Cache collaborator that can drop blocks to make room.
///
/// Called with the manager's lock held: implementations must not call back
/// into the [`MemoryManager`](super::MemoryManager).
pub trait BlockEvictor: Send + Sync {
    /// Evicts cached blocks of `mode` until at least `space` bytes are
    /// freed, never evicting `requesting`.
    ///
    /// Returns the bytes actually freed. Implementations may free nothing
    /// if they cannot cover `space`.
    fn evict_blocks_to_free_space(
        &self,
        requesting: Option<&BlockId>,
        space: u64,
        mode: MemoryMode,
    ) -> u64;
}

/// Why storage memory is being acquired. Behaviour is identical; only the
/// counters differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireKind {
    /// A block being cached.
    Storage,
    /// Space for unrolling an iterator into a block.
    Unroll,
}

/// Storage pool for one memory mode.
pub struct StorageMemoryPool {
    pool: MemoryPool,
    evictor: Option<Weak<dyn BlockEvictor>>,
    storage_bytes_granted: u64,
    unroll_bytes_granted: u64,
}

impl fmt::Debug for StorageMemoryPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageMemoryPool")
            .field("pool", &self.pool)
            .field("has_evictor", &self.evictor.is_some())
            .field("storage_bytes_granted", &self.storage_bytes_granted)
            .field("unroll_bytes_granted", &self.unroll_bytes_granted)
            .finish()
    }
}

impl StorageMemoryPool {
    /// Creates a storage pool of the given capacity with no evictor.
    #[must_use]
    pub fn new(mode: MemoryMode, pool_size: u64) -> Self {
        Self {
            pool: MemoryPool::new(mode, PoolCategory::Storage, pool_size),
            evictor: None,
            storage_bytes_granted: 0,
            unroll_bytes_granted: 0,
        }
    }

    /// Attaches the cache used for eviction. The pool holds it weakly.
    pub fn set_evictor(&mut self, evictor: Weak<dyn BlockEvictor>) {
        self.evictor = Some(evictor);
    }

    /// The underlying counters.
    #[must_use]
    pub fn pool(&self) -> &MemoryPool {
        &self.pool
    }

    /// Current capacity.
    #[must_use]
    pub fn pool_size(&self) -> u64 {
        self.pool.pool_size()
    }

    /// Bytes held by cached blocks.
    #[must_use]
    pub fn memory_used(&self) -> u64 {
        self.pool.memory_used()
    }

    /// Bytes not held by any block.
    #[must_use]
    pub fn memory_free(&self) -> u64 {
        self.pool.memory_free()
    }

    /// Grows capacity.
    pub fn increase_pool_size(&mut self, delta: u64) {
        self.pool.increase_pool_size(delta);
    }

    /// Shrinks capacity, never below what is in use.
    pub fn decrease_pool_size(&mut self, delta: u64) -> u64 {
        self.pool.decrease_pool_size(delta)
    }

    /// Cumulative bytes granted to block storage.
    #[must_use]
    pub fn storage_bytes_granted(&self) -> u64 {
        self.storage_bytes_granted
    }

    /// Cumulative bytes granted for unrolling.
    #[must_use]
    pub fn unroll_bytes_granted(&self) -> u64 {
        self.unroll_bytes_granted
    }

    /// Acquires `num_bytes` for `block`, evicting other blocks if needed.
    ///
    /// All-or-nothing: returns false and grants nothing if the space cannot
    /// be found.
    pub fn acquire(&mut self, block: &BlockId, num_bytes: u64, kind: AcquireKind) -> bool {
        let shortfall = num_bytes.saturating_sub(self.pool.memory_free());
        if shortfall > 0 {
            self.evict(Some(block), shortfall);
        }

        if num_bytes > self.pool.memory_free() {
            debug!(
                "Storage request of {} bytes for {} failed; {} bytes free in {} pool",
                num_bytes,
                block,
                self.pool.memory_free(),
                self.pool.mode()
            );
            return false;
        }

        self.pool.reserve(num_bytes);
        match kind {
            AcquireKind::Storage => self.storage_bytes_granted += num_bytes,
            AcquireKind::Unroll => self.unroll_bytes_granted += num_bytes,
        }
        true
    }

    /// Returns up to `num_bytes`, clamping at zero.
    pub fn release(&mut self, num_bytes: u64) -> u64 {
        let released = self.pool.unreserve(num_bytes);
        if released < num_bytes {
            warn!(
                "Release of {} bytes of {} storage memory exceeds the {} bytes in use",
                num_bytes,
                self.pool.mode(),
                released
            );
        }
        released
    }

    /// Returns everything in use.
    pub fn release_all(&mut self) -> u64 {
        let used = self.pool.memory_used();
        self.pool.unreserve(used)
    }

    /// Frees up to `space` bytes so the pool can shrink by that much.
    ///
    /// Free memory is taken first, then blocks are evicted for the rest.
    /// Returns how much the pool may now shrink by.
    pub fn free_space_to_shrink_pool(&mut self, space: u64) -> u64 {
        let from_free = space.min(self.pool.memory_free());
        let remaining = space - from_free;
        if remaining > 0 {
            from_free + self.evict(None, remaining)
        } else {
            from_free
        }
    }

    fn evict(&mut self, requesting: Option<&BlockId>, space: u64) -> u64 {
        let Some(evictor) = self.evictor.as_ref().and_then(Weak::upgrade) else {
            return 0;
        };
        let mode = self.pool.mode();
        let freed = evictor.evict_blocks_to_free_space(requesting, space, mode);
        let released = self.pool.unreserve(freed);
        debug!(
            "Evicted {} bytes of {} storage memory (wanted {})",
            released, mode, space
        );
        released
    }
}

/// Downgrades a concrete evictor to the weak trait object the pool stores.
pub(crate) fn downgrade_evictor<E: BlockEvictor + 'static>(evictor: &Arc<E>) -> Weak<dyn BlockEvictor> {
    let weak: Weak<E> = Arc::downgrade(evictor);
    weak
}
