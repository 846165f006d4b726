//! Block caches that answer eviction requests from storage pools.

mod lru;

pub use lru::{CacheStats, LruBlockCache};
