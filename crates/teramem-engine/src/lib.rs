//! # teramem-engine
//!
//! Runtime wiring for Teramem: builds the memory manager from a
//! [`MemoryConfig`](teramem_common::MemoryConfig), attaches the block cache
//! used for storage eviction, and opens the persistent region when the
//! persistent tier is selected.
//!
//! ## Modules
//!
//! - [`runtime`] - `MemoryRuntime` lifecycle and block caching
//! - [`task`] - Per-task execution memory handles

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod runtime;
pub mod task;

pub use runtime::{MemoryRuntime, RuntimeStats};
pub use task::TaskMemory;
