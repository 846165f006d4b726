//! Identifier and address types.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Identifier of a task attempt competing for execution memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct TaskId(pub u64);

impl TaskId {
    /// Creates a new task ID.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

impl From<u64> for TaskId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Name of a cached block.
///
/// Cheap to clone; the name is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(Arc<str>);

impl BlockId {
    /// Creates a block ID from a name.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Returns the block name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Address of a managed object.
///
/// The collector owns the objects; this is only an address used for bounds
/// classification and root tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ObjectRef(usize);

impl ObjectRef {
    /// Wraps a raw address.
    #[inline]
    #[must_use]
    pub const fn from_addr(addr: usize) -> Self {
        Self(addr)
    }

    /// Returns the raw address.
    #[inline]
    #[must_use]
    pub const fn addr(self) -> usize {
        self.0
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_id_clone_shares_name() {
        let a = BlockId::new("rdd_3_7");
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(b.as_str(), "rdd_3_7");
    }

    #[test]
    fn test_display() {
        assert_eq!(TaskId::new(42).to_string(), "task-42");
        assert_eq!(ObjectRef::from_addr(0x1000).to_string(), "0x1000");
    }
}
