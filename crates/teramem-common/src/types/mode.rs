//! Memory modes and pool categories.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a byte of managed memory lives.
///
/// The mode is fixed per pool at construction time. Modes double as dense
/// indices (`0..MemoryMode::COUNT`) so per-mode state can be kept in a
/// `[T; MemoryMode::COUNT]` table instead of being matched on repeatedly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryMode {
    /// Memory inside the managed heap.
    OnHeap,
    /// Native memory outside the managed heap.
    OffHeap,
    /// Byte-addressable persistent memory mapped outside the heap.
    PersistentOffHeap,
}

impl MemoryMode {
    /// Number of memory modes.
    pub const COUNT: usize = 3;

    /// All modes, in index order.
    pub const ALL: [MemoryMode; Self::COUNT] = [
        MemoryMode::OnHeap,
        MemoryMode::OffHeap,
        MemoryMode::PersistentOffHeap,
    ];

    /// Returns the dense table index of this mode.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            MemoryMode::OnHeap => 0,
            MemoryMode::OffHeap => 1,
            MemoryMode::PersistentOffHeap => 2,
        }
    }

    /// Returns true for modes that live outside the managed heap.
    #[inline]
    #[must_use]
    pub const fn is_off_heap(self) -> bool {
        !matches!(self, MemoryMode::OnHeap)
    }

    /// Short human-readable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            MemoryMode::OnHeap => "on-heap",
            MemoryMode::OffHeap => "off-heap",
            MemoryMode::PersistentOffHeap => "persistent",
        }
    }
}

impl fmt::Display for MemoryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a pool's bytes are used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolCategory {
    /// Transient computation: sorts, joins, aggregations.
    Execution,
    /// Cached data blocks, subject to eviction.
    Storage,
}

impl PoolCategory {
    /// Short human-readable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            PoolCategory::Execution => "execution",
            PoolCategory::Storage => "storage",
        }
    }
}

impl fmt::Display for PoolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_indices_are_dense() {
        for (i, mode) in MemoryMode::ALL.iter().enumerate() {
            assert_eq!(mode.index(), i);
        }
    }

    #[test]
    fn test_off_heap_classification() {
        assert!(!MemoryMode::OnHeap.is_off_heap());
        assert!(MemoryMode::OffHeap.is_off_heap());
        assert!(MemoryMode::PersistentOffHeap.is_off_heap());
    }

    #[test]
    fn test_mode_serde_names() {
        let json = serde_json::to_string(&MemoryMode::PersistentOffHeap).unwrap();
        assert_eq!(json, "\"persistent_off_heap\"");
        let mode: MemoryMode = serde_json::from_str("\"off_heap\"").unwrap();
        assert_eq!(mode, MemoryMode::OffHeap);
    }
}
