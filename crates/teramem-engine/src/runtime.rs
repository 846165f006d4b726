//! Runtime lifecycle.

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use teramem_adapters::cache::{CacheStats, LruBlockCache};
use teramem_adapters::storage::MmapBacking;
use teramem_common::config::MemoryConfig;
use teramem_common::types::{BlockId, MemoryMode, ObjectRef, TaskId};
use teramem_common::utils::error::{ConfigError, Error, RegionError, Result};
use teramem_core::memory::{MemoryManager, MemoryStats};
use teramem_core::tera::{TeraCache, TeraStats};
use tracing::{debug, info};

use crate::task::TaskMemory;

/// Combined counters of a runtime.
#[derive(Debug, Clone)]
pub struct RuntimeStats {
    /// Pool usage.
    pub memory: MemoryStats,
    /// Block cache counters.
    pub cache: CacheStats,
    /// Persistent region counters, if the persistent tier is selected.
    pub tera: Option<TeraStats>,
}

/// A started memory subsystem.
///
/// Owns the manager, the block cache that storage pools evict from, and,
/// when the persistent tier is selected, the mapped persistent space with
/// its first region already open.
pub struct MemoryRuntime {
    config: MemoryConfig,
    manager: Arc<MemoryManager>,
    cache: Arc<LruBlockCache>,
    /// Promotion is single-writer.
    tera: Option<Mutex<TeraCache>>,
}

impl MemoryRuntime {
    /// Validates `config` and starts the subsystem.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a startup precondition fails, or an
    /// I/O error if the persistent space cannot be mapped.
    pub fn start(config: MemoryConfig) -> Result<Self> {
        let manager = Arc::new(MemoryManager::new(&config)?);
        let cache = Arc::new(LruBlockCache::new());
        manager.set_evictor(&cache);

        let tera = if manager.default_memory_mode() == MemoryMode::PersistentOffHeap {
            Some(Mutex::new(Self::open_persistent_space(&config)?))
        } else {
            None
        };

        info!(
            "Memory runtime started in {} mode",
            manager.default_memory_mode()
        );
        Ok(Self {
            config,
            manager,
            cache,
            tera,
        })
    }

    fn open_persistent_space(config: &MemoryConfig) -> Result<TeraCache> {
        let path = config
            .persistent
            .path
            .as_ref()
            .ok_or(ConfigError::MissingPersistentPath)?;
        let size = usize::try_from(config.persistent.size).map_err(|_| {
            Error::Internal(format!(
                "persistent size {} exceeds the address space",
                config.persistent.size
            ))
        })?;

        let backing = MmapBacking::open(path, size)?;
        let mut tera = TeraCache::with_config(Box::new(backing), config)?;
        tera.tc_new_region()?;
        Ok(tera)
    }

    /// The configuration the runtime was started with.
    #[must_use]
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// The memory manager.
    #[must_use]
    pub fn manager(&self) -> &Arc<MemoryManager> {
        &self.manager
    }

    /// Mode selected at startup.
    #[must_use]
    pub fn default_mode(&self) -> MemoryMode {
        self.manager.default_memory_mode()
    }

    /// Returns true if the persistent region is open.
    #[must_use]
    pub fn has_persistent_space(&self) -> bool {
        self.tera.is_some()
    }

    /// Opens an execution memory handle for `task`.
    #[must_use]
    pub fn task(&self, task: TaskId) -> TaskMemory {
        TaskMemory::new(Arc::clone(&self.manager), task)
    }

    // === Block caching ===

    /// Admits a block into storage memory and the cache.
    ///
    /// Older blocks of the same mode may be evicted to make room. A block
    /// that is already cached is replaced. Returns false if the block does
    /// not fit.
    pub fn cache_block(&self, block: BlockId, size: u64, mode: MemoryMode) -> bool {
        self.uncache_block(&block);
        if !self.manager.acquire_storage_memory(&block, size, mode) {
            debug!("Block {} ({} bytes) rejected by {} storage", block, size, mode);
            return false;
        }
        // A concurrent caller may have cached the same block since the
        // uncache above; its grant is released here.
        if let Some((old_size, old_mode)) = self.cache.insert(block, size, mode) {
            self.manager.release_storage_memory(old_size, old_mode);
        }
        true
    }

    /// Marks a cached block as recently used.
    pub fn touch_block(&self, block: &BlockId) -> bool {
        self.cache.touch(block)
    }

    /// Returns true if the block is still cached.
    #[must_use]
    pub fn is_cached(&self, block: &BlockId) -> bool {
        self.cache.contains(block)
    }

    /// Drops a block and returns its storage memory. Returns the block size.
    pub fn uncache_block(&self, block: &BlockId) -> Option<u64> {
        let (size, mode) = self.cache.remove_entry(block)?;
        self.manager.release_storage_memory(size, mode);
        Some(size)
    }

    // === Persistent region ===

    /// Promotes `payload` into the persistent region.
    ///
    /// When the active region cannot fit the object, the next region is
    /// opened and the promotion retried once.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::NoActiveRegion`] if the persistent tier is not
    /// selected, and [`RegionError::SpaceExhausted`] once no region is left.
    pub fn promote(
        &self,
        obj: ObjectRef,
        payload: &[u8],
        reachable: bool,
    ) -> std::result::Result<ObjectRef, RegionError> {
        let tera = self.tera.as_ref().ok_or(RegionError::NoActiveRegion)?;
        let mut tera = tera.lock();
        match tera.promote(obj, payload, reachable) {
            Err(RegionError::Exhausted { requested, .. })
                if requested <= tera.stats().region_size =>
            {
                tera.tc_new_region()?;
                tera.promote(obj, payload, reachable)
            }
            result => result,
        }
    }

    /// Returns true if `addr` lies in the persistent space.
    #[must_use]
    pub fn is_persistent(&self, addr: usize) -> bool {
        self.tera.as_ref().is_some_and(|tera| tera.lock().tc_check(addr))
    }

    /// Runs `f` with exclusive access to the persistent region.
    pub fn with_tera<R>(&self, f: impl FnOnce(&mut TeraCache) -> R) -> Option<R> {
        self.tera.as_ref().map(|tera| f(&mut tera.lock()))
    }

    /// Persists promoted bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing cannot be flushed.
    pub fn flush(&self) -> io::Result<()> {
        match &self.tera {
            Some(tera) => tera.lock().flush(),
            None => Ok(()),
        }
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            memory: self.manager.stats(),
            cache: self.cache.stats(),
            tera: self.tera.as_ref().map(|tera| tera.lock().stats()),
        }
    }
}

impl std::fmt::Debug for MemoryRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRuntime")
            .field("manager", &self.manager)
            .field("cache", &self.cache.stats())
            .field("tera", &self.tera.as_ref().map(|t| t.lock().stats()))
            .finish()
    }
}
