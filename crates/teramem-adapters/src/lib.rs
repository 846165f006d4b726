//! # teramem-adapters
//!
//! Adapters that plug concrete resources into `teramem-core`:
//!
//! - [`storage`] - File-backed, memory-mapped persistent spaces
//! - [`cache`] - An LRU block cache that serves storage eviction requests

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cache;
pub mod storage;

pub use cache::{CacheStats, LruBlockCache};
pub use storage::MmapBacking;
