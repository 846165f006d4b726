//! # teramem-core
//!
//! Core layer for Teramem: memory pools, the three-mode memory manager, and
//! the persistent-region allocator with its root stack.
//!
//! This crate depends only on `teramem-common`.
//!
//! ## Modules
//!
//! - [`memory`] - Execution/storage pools, sharing policies, and the [`MemoryManager`]
//! - [`tera`] - Bump-allocated persistent regions and root tracking ([`TeraCache`])

pub mod memory;
pub mod tera;

// Re-export commonly used types
pub use memory::{
    BlockEvictor, MemoryManager, MemoryStats, SharingPolicy, StaticPartition, UnifiedSharing,
};
pub use tera::{HeapBacking, RegionBacking, RootStack, TeraCache, TeraStats};
