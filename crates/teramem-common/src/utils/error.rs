//! Error types for Teramem.
//!
//! Acquisition paths never error: they return partial grants or `false`.
//! Errors are reserved for startup configuration problems, persistent-region
//! exhaustion, and backing I/O.

use thiserror::Error;

use crate::types::MemoryMode;

/// Result type alias for Teramem operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Startup configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Persistent region operation failed.
    #[error("region error: {0}")]
    Region(#[from] RegionError),

    /// I/O error from a region backing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Fatal configuration errors, raised once before any pool is used.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A mode was enabled with no capacity behind it.
    #[error("{mode} memory is enabled but its size is 0")]
    ModeWithoutCapacity {
        /// The offending mode.
        mode: MemoryMode,
    },

    /// Off-heap memory requires unaligned access support.
    #[error("off-heap memory requires unaligned memory access, which this platform lacks")]
    UnalignedAccessUnsupported,

    /// Storage fraction must lie in `[0, 1]`.
    #[error("storage fraction must be within [0, 1], got {0}")]
    InvalidStorageFraction(f64),

    /// Persistent memory was enabled without a backing path.
    #[error("persistent memory is enabled but no backing path is configured")]
    MissingPersistentPath,

    /// Page size override is not a usable size.
    #[error("page size must be a non-zero power of two, got {0}")]
    InvalidPageSize(u64),

    /// Object alignment is not a power of two.
    #[error("object alignment must be a non-zero power of two, got {0}")]
    InvalidAlignment(usize),

    /// Region size is zero or larger than the persistent space.
    #[error("region size {region_size} does not fit a persistent space of {space_size} bytes")]
    InvalidRegionSize {
        /// Configured region size.
        region_size: u64,
        /// Configured persistent space size.
        space_size: u64,
    },

    /// Core count override must be positive.
    #[error("core count must be positive")]
    InvalidCoreCount,

    /// A mode's pool sizes do not fit in a `u64` when added up.
    #[error("{mode} pool sizes overflow when combined")]
    CapacityOverflow {
        /// The offending mode.
        mode: MemoryMode,
    },
}

/// Recoverable persistent-region conditions.
///
/// None of these mutate allocator state; the caller decides whether to open
/// a new region or run a collection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegionError {
    /// The current region cannot fit the request.
    #[error("region exhausted: requested {requested} bytes, {remaining} remaining")]
    Exhausted {
        /// Aligned request size.
        requested: usize,
        /// Bytes left in the current region.
        remaining: usize,
    },

    /// No region has been opened yet.
    #[error("no active region")]
    NoActiveRegion,

    /// The persistent space has no room for another region.
    #[error("persistent space exhausted: {remaining} bytes left, region needs {region_size}")]
    SpaceExhausted {
        /// Bytes left in the space.
        remaining: usize,
        /// Size of one region.
        region_size: usize,
    },

    /// A read touched bytes outside every opened region.
    #[error("address {addr:#x} (+{len}) is outside the allocated persistent range")]
    OutOfBounds {
        /// Requested start address.
        addr: usize,
        /// Requested length.
        len: usize,
    },
}
