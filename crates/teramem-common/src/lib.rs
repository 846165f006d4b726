//! # teramem-common
//!
//! Foundation layer for Teramem: memory modes, identifiers, configuration,
//! and errors.
//!
//! This crate provides the vocabulary shared by every other Teramem crate.
//! It has no internal dependencies and should be kept minimal.
//!
//! ## Modules
//!
//! - [`types`] - Core type definitions (MemoryMode, PoolCategory, TaskId, BlockId, ObjectRef)
//! - [`config`] - Typed memory configuration with defaults and validation
//! - [`utils`] - Utility functions and helpers (errors, byte math, platform checks)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod types;
pub mod utils;

// Re-export commonly used types at crate root
pub use config::{MemoryConfig, OffHeapConfig, PersistentConfig, SharingPolicyKind};
pub use types::{BlockId, MemoryMode, ObjectRef, PoolCategory, TaskId};
pub use utils::error::{ConfigError, Error, RegionError, Result};
