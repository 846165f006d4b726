//! Execution memory with per-task fair-share accounting.
//!
//! With `N` active tasks in a pool of size `C`, each task is entitled to at
//! least `C / (2N)` before it has to wait behind peers that hold more. A
//! task below its floor that cannot be satisfied from free memory waits for
//! a release; the manager owns the wait itself, this type only decides.
//!
//! While some other task is waiting below its floor, grants are also capped
//! so that no task grows past `max_pool_size / N`. Without a starving peer,
//! a request gets whatever is free.

use hashbrown::{HashMap, HashSet};
use teramem_common::types::{MemoryMode, PoolCategory, TaskId};
use tracing::warn;

use super::pool::MemoryPool;

/// Outcome of one acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireStep {
    /// The task was granted this many bytes (possibly fewer than asked).
    Granted(u64),
    /// The task is below its fair share and must wait for a release.
    Wait,
}

/// Execution pool for one memory mode.
#[derive(Debug, Clone)]
pub struct ExecutionMemoryPool {
    pool: MemoryPool,
    /// Bytes held per active task. Sums to `pool.memory_used()`.
    memory_for_task: HashMap<TaskId, u64>,
    /// Tasks currently blocked below their floor.
    waiting: HashSet<TaskId>,
}

impl ExecutionMemoryPool {
    /// Creates an execution pool of the given capacity.
    #[must_use]
    pub fn new(mode: MemoryMode, pool_size: u64) -> Self {
        Self {
            pool: MemoryPool::new(mode, PoolCategory::Execution, pool_size),
            memory_for_task: HashMap::new(),
            waiting: HashSet::new(),
        }
    }

    /// The underlying counters.
    #[must_use]
    pub fn pool(&self) -> &MemoryPool {
        &self.pool
    }

    /// Current capacity.
    #[must_use]
    pub fn pool_size(&self) -> u64 {
        self.pool.pool_size()
    }

    /// Bytes held by all tasks.
    #[must_use]
    pub fn memory_used(&self) -> u64 {
        self.pool.memory_used()
    }

    /// Bytes not held by any task.
    #[must_use]
    pub fn memory_free(&self) -> u64 {
        self.pool.memory_free()
    }

    /// Grows capacity.
    pub fn increase_pool_size(&mut self, delta: u64) {
        self.pool.increase_pool_size(delta);
    }

    /// Shrinks capacity, never below what is in use.
    pub fn decrease_pool_size(&mut self, delta: u64) -> u64 {
        self.pool.decrease_pool_size(delta)
    }

    /// Bytes held by `task`.
    #[must_use]
    pub fn memory_used_by(&self, task: TaskId) -> u64 {
        self.memory_for_task.get(&task).copied().unwrap_or(0)
    }

    /// Number of tasks that currently count toward the fair share.
    #[must_use]
    pub fn active_tasks(&self) -> usize {
        self.memory_for_task.len()
    }

    /// Number of tasks blocked below their floor.
    #[must_use]
    pub fn waiting_tasks(&self) -> usize {
        self.waiting.len()
    }

    /// Makes `task` active. Returns true if it was not active before, in
    /// which case every waiter's floor just changed.
    pub fn register_task(&mut self, task: TaskId) -> bool {
        if self.memory_for_task.contains_key(&task) {
            return false;
        }
        self.memory_for_task.insert(task, 0);
        true
    }

    /// Records whether `task` is blocked below its floor.
    pub fn set_waiting(&mut self, task: TaskId, waiting: bool) {
        if waiting {
            self.waiting.insert(task);
        } else {
            self.waiting.remove(&task);
        }
    }

    /// Attempts to grant up to `num_bytes` to a registered task.
    ///
    /// `max_pool_size` is how large the pool could grow under the sharing
    /// policy; it bounds the per-task ceiling.
    pub fn try_acquire(&mut self, num_bytes: u64, task: TaskId, max_pool_size: u64) -> AcquireStep {
        self.register_task(task);

        let active = self.memory_for_task.len() as u64;
        let current = self.memory_used_by(task);
        let min_per_task = self.pool.pool_size() / (2 * active);

        let peer_starving = self.waiting.iter().any(|t| *t != task);
        let max_to_grant = if peer_starving {
            let max_per_task = max_pool_size / active;
            num_bytes.min(max_per_task.saturating_sub(current))
        } else {
            num_bytes
        };
        let to_grant = max_to_grant.min(self.pool.memory_free());

        if to_grant < num_bytes && current + to_grant < min_per_task {
            return AcquireStep::Wait;
        }

        self.pool.reserve(to_grant);
        *self.memory_for_task.entry(task).or_insert(0) += to_grant;
        AcquireStep::Granted(to_grant)
    }

    /// Releases up to `num_bytes` held by `task`, clamping at its balance.
    ///
    /// A task whose balance reaches zero stops counting as active. Returns
    /// the bytes actually released.
    pub fn release(&mut self, num_bytes: u64, task: TaskId) -> u64 {
        let Some(held) = self.memory_for_task.get_mut(&task) else {
            if num_bytes > 0 {
                warn!(
                    "Release of {} bytes for {} with no {} execution memory held",
                    num_bytes,
                    task,
                    self.pool.mode()
                );
            }
            return 0;
        };

        let to_release = if num_bytes > *held {
            warn!(
                "Release of {} bytes for {} exceeds its {} bytes of {} execution memory",
                num_bytes,
                task,
                *held,
                self.pool.mode()
            );
            *held
        } else {
            num_bytes
        };

        *held -= to_release;
        if *held == 0 {
            self.memory_for_task.remove(&task);
        }
        self.pool.unreserve(to_release)
    }

    /// Releases everything held by `task` and forgets it.
    ///
    /// Returns the bytes released; zero for an unknown task.
    pub fn release_all(&mut self, task: TaskId) -> u64 {
        self.waiting.remove(&task);
        match self.memory_for_task.remove(&task) {
            Some(held) => self.pool.unreserve(held),
            None => 0,
        }
    }

    /// Sum of per-task balances; equals `memory_used()`.
    #[must_use]
    pub fn task_total(&self) -> u64 {
        self.memory_for_task.values().sum()
    }
}
