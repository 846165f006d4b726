//! Core type definitions for Teramem.
//!
//! - Memory classification ([`MemoryMode`], [`PoolCategory`])
//! - Identifier types ([`TaskId`], [`BlockId`])
//! - Object addresses ([`ObjectRef`])

mod id;
mod mode;

pub use id::{BlockId, ObjectRef, TaskId};
pub use mode::{MemoryMode, PoolCategory};
