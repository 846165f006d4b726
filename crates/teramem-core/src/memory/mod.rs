//! Memory accounting across on-heap, off-heap, and persistent memory.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      MemoryManager                           │
//! │            Mutex<PoolTable> + Condvar (memory freed)         │
//! │  ┌──────────────────┬──────────────────┬──────────────────┐  │
//! │  │     on-heap      │     off-heap     │    persistent    │  │
//! │  │ execution│storage│ execution│storage│ execution│storage│  │
//! │  └──────────────────┴──────────────────┴──────────────────┘  │
//! │                 SharingPolicy per mode:                      │
//! │      static partition | unified (execution ⇄ storage)        │
//! └──────────────────────────────────────────────────────────────┘
//!                │                               │
//!        tasks (blocking,                 block cache
//!        fair-share grants)          (all-or-nothing, evicts)
//! ```
//!
//! # Usage
//!
//! ```
//! use teramem_common::config::MemoryConfig;
//! use teramem_common::types::{MemoryMode, TaskId};
//! use teramem_core::memory::MemoryManager;
//!
//! let manager = MemoryManager::new(&MemoryConfig::default().with_on_heap(1000, 1000)).unwrap();
//!
//! let granted = manager.acquire_execution_memory(600, TaskId::new(1), MemoryMode::OnHeap);
//! assert_eq!(granted, 600);
//! assert_eq!(manager.release_all_execution_memory_for_task(TaskId::new(1)), 600);
//! ```

mod execution;
mod manager;
mod page;
mod policy;
mod pool;
mod stats;
mod storage;

pub use execution::{AcquireStep, ExecutionMemoryPool};
pub use manager::{MemoryManager, resolve_memory_mode};
pub use page::{MAX_PAGE_SIZE, MIN_PAGE_SIZE, PAGE_SIZE_SAFETY_FACTOR, default_page_size};
pub use policy::{ModePools, SharingPolicy, StaticPartition, UnifiedSharing};
pub use pool::MemoryPool;
pub use stats::{MemoryStats, PoolStats};
pub use storage::{AcquireKind, BlockEvictor, StorageMemoryPool};
