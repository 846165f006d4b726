//! Memory configuration.
//!
//! This is the subsystem's input boundary: the engine translates its own
//! settings into a [`MemoryConfig`] once at startup.
//!
//! ```
//! use teramem_common::config::MemoryConfig;
//! use teramem_common::utils::bytes::MIB;
//!
//! let config = MemoryConfig::default()
//!     .with_off_heap(512 * MIB)
//!     .with_storage_fraction(0.3);
//! assert!(config.validate().is_ok());
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::MemoryMode;
use crate::utils::bytes::MIB;
use crate::utils::error::ConfigError;

/// Default fraction of a mode's total that is reserved for storage.
pub const DEFAULT_STORAGE_FRACTION: f64 = 0.5;

/// Default object alignment for promoted objects.
pub const DEFAULT_OBJECT_ALIGNMENT: usize = 8;

/// How execution and storage share a mode's memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharingPolicyKind {
    /// Fixed split; neither side borrows.
    StaticPartition,
    /// Execution may reclaim storage above its protected region, and storage
    /// may borrow free execution memory.
    #[default]
    Unified,
}

/// Off-heap tier settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OffHeapConfig {
    /// Whether off-heap memory may be used.
    pub enabled: bool,
    /// Total off-heap bytes, split between execution and storage.
    pub size: u64,
}

/// Persistent-memory tier settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistentConfig {
    /// Whether the persistent tier may be used.
    pub enabled: bool,
    /// Total persistent bytes, split between execution and storage. This is
    /// also the size of the mapped space.
    pub size: u64,
    /// Backing file for the mapped space.
    pub path: Option<PathBuf>,
    /// Size of each bump-allocated region. Defaults to the whole space.
    pub region_size: Option<u64>,
}

/// Configuration for the memory manager and persistent region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// On-heap execution pool size in bytes.
    pub on_heap_execution: u64,
    /// On-heap storage pool size in bytes.
    pub on_heap_storage: u64,
    /// Off-heap tier.
    pub off_heap: OffHeapConfig,
    /// Persistent tier.
    pub persistent: PersistentConfig,
    /// Fraction of off-heap and persistent totals given to storage.
    pub storage_fraction: f64,
    /// Explicit page size; derived from capacity when `None`.
    pub page_size: Option<u64>,
    /// Cores used for page-size derivation; host parallelism when `None`.
    pub cores: Option<usize>,
    /// Alignment of promoted objects in the persistent region.
    pub object_alignment: usize,
    /// Execution/storage sharing policy.
    pub sharing_policy: SharingPolicyKind,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            on_heap_execution: 256 * MIB,
            on_heap_storage: 256 * MIB,
            off_heap: OffHeapConfig::default(),
            persistent: PersistentConfig::default(),
            storage_fraction: DEFAULT_STORAGE_FRACTION,
            page_size: None,
            cores: None,
            object_alignment: DEFAULT_OBJECT_ALIGNMENT,
            sharing_policy: SharingPolicyKind::default(),
        }
    }
}

impl MemoryConfig {
    /// Sets on-heap execution and storage sizes.
    #[must_use]
    pub fn with_on_heap(mut self, execution: u64, storage: u64) -> Self {
        self.on_heap_execution = execution;
        self.on_heap_storage = storage;
        self
    }

    /// Enables off-heap memory with the given total size.
    #[must_use]
    pub fn with_off_heap(mut self, size: u64) -> Self {
        self.off_heap = OffHeapConfig {
            enabled: true,
            size,
        };
        self
    }

    /// Enables the persistent tier backed by a file at `path`.
    #[must_use]
    pub fn with_persistent(mut self, size: u64, path: impl AsRef<Path>) -> Self {
        self.persistent.enabled = true;
        self.persistent.size = size;
        self.persistent.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the persistent region size.
    #[must_use]
    pub fn with_region_size(mut self, region_size: u64) -> Self {
        self.persistent.region_size = Some(region_size);
        self
    }

    /// Sets the storage fraction.
    #[must_use]
    pub fn with_storage_fraction(mut self, fraction: f64) -> Self {
        self.storage_fraction = fraction;
        self
    }

    /// Overrides the derived page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Overrides the core count.
    #[must_use]
    pub fn with_cores(mut self, cores: usize) -> Self {
        self.cores = Some(cores);
        self
    }

    /// Sets the sharing policy.
    #[must_use]
    pub fn with_sharing_policy(mut self, policy: SharingPolicyKind) -> Self {
        self.sharing_policy = policy;
        self
    }

    /// Returns whether a mode is enabled. On-heap is always enabled.
    #[must_use]
    pub fn is_enabled(&self, mode: MemoryMode) -> bool {
        match mode {
            MemoryMode::OnHeap => true,
            MemoryMode::OffHeap => self.off_heap.enabled,
            MemoryMode::PersistentOffHeap => self.persistent.enabled,
        }
    }

    /// Total bytes configured for a mode, zero when disabled.
    #[must_use]
    pub fn mode_total(&self, mode: MemoryMode) -> u64 {
        match mode {
            MemoryMode::OnHeap => self.on_heap_execution.saturating_add(self.on_heap_storage),
            MemoryMode::OffHeap if self.off_heap.enabled => self.off_heap.size,
            MemoryMode::PersistentOffHeap if self.persistent.enabled => self.persistent.size,
            _ => 0,
        }
    }

    /// Initial `(execution, storage)` split of a mode's total.
    ///
    /// On-heap sizes are taken as given; the other tiers are split by the
    /// storage fraction, rounding storage down.
    #[must_use]
    pub fn initial_split(&self, mode: MemoryMode) -> (u64, u64) {
        match mode {
            MemoryMode::OnHeap => (self.on_heap_execution, self.on_heap_storage),
            _ => {
                let total = self.mode_total(mode);
                let storage = ((total as f64) * self.storage_fraction).floor() as u64;
                let storage = storage.min(total);
                (total - storage, storage)
            }
        }
    }

    /// Persistent region size, defaulting to the whole space.
    #[must_use]
    pub fn region_size(&self) -> u64 {
        self.persistent.region_size.unwrap_or(self.persistent.size)
    }

    /// Checks value ranges that do not depend on mode selection.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.storage_fraction) {
            return Err(ConfigError::InvalidStorageFraction(self.storage_fraction));
        }
        if let Some(page_size) = self.page_size {
            if !page_size.is_power_of_two() {
                return Err(ConfigError::InvalidPageSize(page_size));
            }
        }
        if !self.object_alignment.is_power_of_two() {
            return Err(ConfigError::InvalidAlignment(self.object_alignment));
        }
        if self.cores == Some(0) {
            return Err(ConfigError::InvalidCoreCount);
        }
        if self
            .on_heap_execution
            .checked_add(self.on_heap_storage)
            .is_none()
        {
            return Err(ConfigError::CapacityOverflow {
                mode: MemoryMode::OnHeap,
            });
        }
        if self.persistent.enabled && self.persistent.size > 0 {
            let region_size = self.region_size();
            if region_size == 0 || region_size > self.persistent.size {
                return Err(ConfigError::InvalidRegionSize {
                    region_size,
                    space_size: self.persistent.size,
                });
            }
        }
        Ok(())
    }
}
