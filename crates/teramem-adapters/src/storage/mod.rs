//! Persistent backings for the region allocator.

mod mmap;

pub use mmap::MmapBacking;
