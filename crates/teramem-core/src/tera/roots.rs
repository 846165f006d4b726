//! LIFO stack of promoted roots.

use teramem_common::types::ObjectRef;

/// Roots pushed during promotion and drained by a persistent-tier
/// reachability pass.
///
/// Every entry must stay valid from push until pop. The stack is empty
/// at the start and end of every pass that consumes it.
#[derive(Debug, Clone)]
pub struct RootStack<T = ObjectRef> {
    roots: Vec<T>,
}

impl<T> Default for RootStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RootStack<T> {
    /// Creates an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self { roots: Vec::new() }
    }

    /// Pushes a root.
    pub fn push(&mut self, root: T) {
        self.roots.push(root);
    }

    /// Pops the most recently pushed root.
    ///
    /// # Panics
    ///
    /// Panics if the stack is empty: every pop must match an earlier push.
    pub fn pop(&mut self) -> T {
        match self.roots.pop() {
            Some(root) => root,
            None => panic!("root stack popped while empty"),
        }
    }

    /// Pops a root if there is one.
    pub fn try_pop(&mut self) -> Option<T> {
        self.roots.pop()
    }

    /// Pops every root, most recent first.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.roots.drain(..).rev()
    }

    /// Number of pending roots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Returns true if no roots are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}
