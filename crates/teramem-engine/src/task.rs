//! Per-task execution memory handles.

use std::sync::Arc;

use teramem_common::types::{MemoryMode, TaskId};
use teramem_core::memory::MemoryManager;
use tracing::{debug, warn};

/// Execution memory held on behalf of one task.
///
/// Everything the task still holds is released exactly once: either by
/// [`complete`](Self::complete) or when the handle is dropped.
///
/// # Examples
///
/// ```
/// use teramem_common::{MemoryConfig, MemoryMode, TaskId};
/// use teramem_engine::MemoryRuntime;
///
/// let runtime = MemoryRuntime::start(MemoryConfig::default().with_on_heap(1000, 1000)).unwrap();
/// let task = runtime.task(TaskId::new(1));
/// assert_eq!(task.acquire(400, MemoryMode::OnHeap), 400);
/// assert_eq!(task.complete(), 400);
/// ```
#[derive(Debug)]
pub struct TaskMemory {
    manager: Arc<MemoryManager>,
    task: TaskId,
    completed: bool,
}

impl TaskMemory {
    pub(crate) fn new(manager: Arc<MemoryManager>, task: TaskId) -> Self {
        Self {
            manager,
            task,
            completed: false,
        }
    }

    /// The task this handle belongs to.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.task
    }

    /// Acquires up to `num_bytes` of execution memory in `mode`.
    ///
    /// May block while other tasks hold more than their share.
    pub fn acquire(&self, num_bytes: u64, mode: MemoryMode) -> u64 {
        self.manager
            .acquire_execution_memory(num_bytes, self.task, mode)
    }

    /// Acquires in the manager's default mode.
    pub fn acquire_default(&self, num_bytes: u64) -> u64 {
        self.acquire(num_bytes, self.manager.default_memory_mode())
    }

    /// Returns `num_bytes` of `mode` memory.
    pub fn release(&self, num_bytes: u64, mode: MemoryMode) {
        self.manager
            .release_execution_memory(num_bytes, self.task, mode);
    }

    /// Cancels any wait this task is blocked in.
    pub fn interrupt(&self) {
        self.manager.interrupt_task(self.task);
    }

    /// Bytes held across all modes.
    #[must_use]
    pub fn used(&self) -> u64 {
        self.manager.execution_memory_used_for_task(self.task)
    }

    /// Releases everything the task holds and returns the byte count.
    pub fn complete(mut self) -> u64 {
        self.completed = true;
        let freed = self.manager.release_all_execution_memory_for_task(self.task);
        debug!("{} completed, released {} bytes", self.task, freed);
        freed
    }
}

impl Drop for TaskMemory {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        let freed = self.manager.release_all_execution_memory_for_task(self.task);
        if freed > 0 {
            warn!(
                "{} dropped without completing, released {} leaked bytes",
                self.task, freed
            );
        }
    }
}
