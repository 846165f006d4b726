//! The memory manager: six pools behind one lock.

use std::sync::Arc;

use hashbrown::HashSet;
use parking_lot::{Condvar, Mutex};
use teramem_common::config::MemoryConfig;
use teramem_common::types::{BlockId, MemoryMode, TaskId};
use teramem_common::utils::error::{ConfigError, Result};
use teramem_common::utils::platform;
use tracing::{debug, info};

use super::execution::AcquireStep;
use super::page::default_page_size;
use super::policy::{ModePools, SharingPolicy, policy_for};
use super::stats::{MemoryStats, PoolStats};
use super::storage::{AcquireKind, BlockEvictor, downgrade_evictor};

/// Everything guarded by the manager's lock.
#[derive(Debug)]
struct PoolTable {
    modes: [ModePools; MemoryMode::COUNT],
    /// Tasks whose waits have been cancelled.
    interrupted: HashSet<TaskId>,
}

impl PoolTable {
    fn get(&self, mode: MemoryMode) -> &ModePools {
        &self.modes[mode.index()]
    }

    fn get_mut(&mut self, mode: MemoryMode) -> &mut ModePools {
        &mut self.modes[mode.index()]
    }
}

/// Picks the default mode for engine buffers.
///
/// Precedence is off-heap, then persistent, then on-heap. Every enabled
/// tier must have capacity, and off-heap needs unaligned access.
///
/// # Errors
///
/// Returns the violated precondition.
pub fn resolve_memory_mode(
    config: &MemoryConfig,
    unaligned_supported: bool,
) -> std::result::Result<MemoryMode, ConfigError> {
    for mode in [MemoryMode::OffHeap, MemoryMode::PersistentOffHeap] {
        if config.is_enabled(mode) && config.mode_total(mode) == 0 {
            return Err(ConfigError::ModeWithoutCapacity { mode });
        }
    }
    if config.off_heap.enabled {
        if !unaligned_supported {
            return Err(ConfigError::UnalignedAccessUnsupported);
        }
        return Ok(MemoryMode::OffHeap);
    }
    if config.persistent.enabled {
        return Ok(MemoryMode::PersistentOffHeap);
    }
    Ok(MemoryMode::OnHeap)
}

/// Accounts execution and storage memory across all three modes.
///
/// Every acquire and release serializes on one lock, so capacity moves
/// between a mode's execution and storage pools are atomic with respect to
/// every other operation. Execution acquisition may block on a condition
/// variable until the task's fair share is available; storage acquisition
/// never blocks but may evict synchronously.
pub struct MemoryManager {
    pools: Mutex<PoolTable>,
    /// Signalled whenever memory is released or the set of tasks changes.
    memory_changed: Condvar,
    policy: Box<dyn SharingPolicy>,
    default_mode: MemoryMode,
    page_size: u64,
}

impl MemoryManager {
    /// Creates a manager with the configured sharing policy.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a startup precondition fails.
    pub fn new(config: &MemoryConfig) -> Result<Self> {
        Self::with_policy(config, policy_for(config.sharing_policy))
    }

    /// Creates a manager with an explicit sharing policy.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a startup precondition fails.
    pub fn with_policy(config: &MemoryConfig, policy: Box<dyn SharingPolicy>) -> Result<Self> {
        Self::build(config, policy, platform::supports_unaligned_access())
    }

    fn build(
        config: &MemoryConfig,
        policy: Box<dyn SharingPolicy>,
        unaligned_supported: bool,
    ) -> Result<Self> {
        config.validate()?;
        let default_mode = resolve_memory_mode(config, unaligned_supported)?;

        let modes = MemoryMode::ALL.map(|mode| {
            let (execution, storage) = config.initial_split(mode);
            ModePools::new(mode, execution, storage)
        });

        let cores = config.cores.unwrap_or_else(platform::available_cores);
        let page_size = config.page_size.unwrap_or_else(|| {
            default_page_size(modes[default_mode.index()].execution.pool_size(), cores)
        });

        info!(
            "Memory manager started: default mode {}, page size {} bytes, {} sharing",
            default_mode,
            page_size,
            policy.name()
        );
        for pools in &modes {
            debug!(
                "{} pools: execution {} bytes, storage {} bytes",
                pools.execution.pool().mode(),
                pools.execution.pool_size(),
                pools.storage.pool_size()
            );
        }

        Ok(Self {
            pools: Mutex::new(PoolTable {
                modes,
                interrupted: HashSet::new(),
            }),
            memory_changed: Condvar::new(),
            policy,
            default_mode,
            page_size,
        })
    }

    /// Mode used by default for engine-internal buffers.
    #[must_use]
    pub fn default_memory_mode(&self) -> MemoryMode {
        self.default_mode
    }

    /// Page size for engine-internal buffers.
    #[must_use]
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Name of the sharing policy in use.
    #[must_use]
    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Attaches the block cache used for storage eviction in every mode.
    ///
    /// The manager keeps only weak references.
    pub fn set_evictor<E: BlockEvictor + 'static>(&self, evictor: &Arc<E>) {
        let mut table = self.pools.lock();
        for pools in &mut table.modes {
            pools.storage.set_evictor(downgrade_evictor(evictor));
        }
    }

    // === Execution memory ===

    /// Acquires up to `num_bytes` of execution memory for `task`.
    ///
    /// Blocks while the task is below its fair share and nothing is free.
    /// Returns the bytes granted, which may be fewer than requested, or 0
    /// if the wait was cancelled through [`interrupt_task`](Self::interrupt_task).
    pub fn acquire_execution_memory(&self, num_bytes: u64, task: TaskId, mode: MemoryMode) -> u64 {
        let mut table = self.pools.lock();

        if table.get_mut(mode).execution.register_task(task) {
            // Every waiter's floor just shrank.
            self.memory_changed.notify_all();
        }

        loop {
            let interrupted = table.interrupted.contains(&task);
            let pools = table.get_mut(mode);
            let shortfall = num_bytes.saturating_sub(pools.execution.memory_free());
            self.policy.grow_execution_pool(pools, shortfall);
            let max_pool_size = self.policy.max_execution_pool_size(pools);

            match pools.execution.try_acquire(num_bytes, task, max_pool_size) {
                AcquireStep::Granted(granted) => {
                    pools.execution.set_waiting(task, false);
                    return granted;
                }
                AcquireStep::Wait if interrupted => {
                    pools.execution.set_waiting(task, false);
                    debug!("{} stopped waiting for {} execution memory", task, mode);
                    return 0;
                }
                AcquireStep::Wait => {
                    pools.execution.set_waiting(task, true);
                    debug!(
                        "{} waiting for {} bytes of {} execution memory",
                        task, num_bytes, mode
                    );
                    self.memory_changed.wait(&mut table);
                }
            }
        }
    }

    /// Releases up to `num_bytes` of `task`'s execution memory, clamping at
    /// what it holds.
    pub fn release_execution_memory(&self, num_bytes: u64, task: TaskId, mode: MemoryMode) {
        let released = self
            .pools
            .lock()
            .get_mut(mode)
            .execution
            .release(num_bytes, task);
        if released > 0 {
            self.memory_changed.notify_all();
        }
    }

    /// Releases all of `task`'s execution memory in every mode.
    ///
    /// Returns the bytes freed; 0 for a task that holds nothing.
    pub fn release_all_execution_memory_for_task(&self, task: TaskId) -> u64 {
        let mut table = self.pools.lock();
        table.interrupted.remove(&task);
        let mut freed = 0;
        for pools in &mut table.modes {
            freed += pools.execution.release_all(task);
        }
        drop(table);

        if freed > 0 {
            debug!("Released {} bytes of execution memory for {}", freed, task);
            self.memory_changed.notify_all();
        }
        freed
    }

    /// Cancels any current or future wait of `task`.
    ///
    /// The task keeps what it already holds. Cleared when its memory is
    /// released with [`release_all_execution_memory_for_task`](Self::release_all_execution_memory_for_task).
    pub fn interrupt_task(&self, task: TaskId) {
        self.pools.lock().interrupted.insert(task);
        self.memory_changed.notify_all();
    }

    /// Execution bytes held by `task` across all modes.
    #[must_use]
    pub fn execution_memory_used_for_task(&self, task: TaskId) -> u64 {
        let table = self.pools.lock();
        table
            .modes
            .iter()
            .map(|p| p.execution.memory_used_by(task))
            .sum()
    }

    /// Execution bytes in use in `mode`.
    #[must_use]
    pub fn execution_memory_used(&self, mode: MemoryMode) -> u64 {
        self.pools.lock().get(mode).execution.memory_used()
    }

    /// Current execution pool capacity in `mode`.
    #[must_use]
    pub fn execution_pool_size(&self, mode: MemoryMode) -> u64 {
        self.pools.lock().get(mode).execution.pool_size()
    }

    // === Storage memory ===

    /// Acquires `num_bytes` of storage memory to cache `block`.
    ///
    /// May evict other blocks first. All-or-nothing.
    pub fn acquire_storage_memory(&self, block: &BlockId, num_bytes: u64, mode: MemoryMode) -> bool {
        self.acquire_storage(block, num_bytes, mode, AcquireKind::Storage)
    }

    /// Acquires `num_bytes` for unrolling `block`. Same rules as
    /// [`acquire_storage_memory`](Self::acquire_storage_memory), counted separately.
    pub fn acquire_unroll_memory(&self, block: &BlockId, num_bytes: u64, mode: MemoryMode) -> bool {
        self.acquire_storage(block, num_bytes, mode, AcquireKind::Unroll)
    }

    fn acquire_storage(
        &self,
        block: &BlockId,
        num_bytes: u64,
        mode: MemoryMode,
        kind: AcquireKind,
    ) -> bool {
        let mut table = self.pools.lock();
        let pools = table.get_mut(mode);

        let max_storage = self.policy.max_storage_memory(pools);
        if num_bytes > max_storage {
            info!(
                "Will not store {} as the required space ({} bytes) exceeds the {} storage limit ({} bytes)",
                block, num_bytes, mode, max_storage
            );
            return false;
        }

        self.policy.borrow_for_storage(pools, num_bytes);
        pools.storage.acquire(block, num_bytes, kind)
    }

    /// Releases `num_bytes` of storage memory, clamping at what is in use.
    pub fn release_storage_memory(&self, num_bytes: u64, mode: MemoryMode) {
        let released = self.pools.lock().get_mut(mode).storage.release(num_bytes);
        if released > 0 {
            // Execution may now reclaim storage capacity.
            self.memory_changed.notify_all();
        }
    }

    /// Releases unroll memory. Unroll memory is storage memory.
    pub fn release_unroll_memory(&self, num_bytes: u64, mode: MemoryMode) {
        self.release_storage_memory(num_bytes, mode);
    }

    /// Releases all storage memory in every mode.
    pub fn release_all_storage_memory(&self) {
        let mut table = self.pools.lock();
        for pools in &mut table.modes {
            pools.storage.release_all();
        }
        drop(table);
        self.memory_changed.notify_all();
    }

    /// Largest storage request that could succeed in `mode` right now.
    #[must_use]
    pub fn max_storage_memory(&self, mode: MemoryMode) -> u64 {
        let table = self.pools.lock();
        self.policy.max_storage_memory(table.get(mode))
    }

    /// See [`max_storage_memory`](Self::max_storage_memory).
    #[must_use]
    pub fn max_on_heap_storage_memory(&self) -> u64 {
        self.max_storage_memory(MemoryMode::OnHeap)
    }

    /// See [`max_storage_memory`](Self::max_storage_memory).
    #[must_use]
    pub fn max_off_heap_storage_memory(&self) -> u64 {
        self.max_storage_memory(MemoryMode::OffHeap)
    }

    /// See [`max_storage_memory`](Self::max_storage_memory).
    #[must_use]
    pub fn max_persistent_storage_memory(&self) -> u64 {
        self.max_storage_memory(MemoryMode::PersistentOffHeap)
    }

    /// Storage bytes in use in `mode`.
    #[must_use]
    pub fn storage_memory_used(&self, mode: MemoryMode) -> u64 {
        self.pools.lock().get(mode).storage.memory_used()
    }

    /// Current storage pool capacity in `mode`.
    #[must_use]
    pub fn storage_pool_size(&self, mode: MemoryMode) -> u64 {
        self.pools.lock().get(mode).storage.pool_size()
    }

    /// Snapshot of every pool.
    #[must_use]
    pub fn stats(&self) -> MemoryStats {
        let table = self.pools.lock();
        let mut pools = Vec::with_capacity(2 * MemoryMode::COUNT);
        for mode_pools in &table.modes {
            let execution = mode_pools.execution.pool();
            pools.push(PoolStats {
                mode: execution.mode(),
                category: execution.category(),
                pool_size: execution.pool_size(),
                memory_used: execution.memory_used(),
                active_tasks: mode_pools.execution.active_tasks(),
                waiting_tasks: mode_pools.execution.waiting_tasks(),
                storage_bytes_granted: 0,
                unroll_bytes_granted: 0,
            });
            let storage = mode_pools.storage.pool();
            pools.push(PoolStats {
                mode: storage.mode(),
                category: storage.category(),
                pool_size: storage.pool_size(),
                memory_used: storage.memory_used(),
                active_tasks: 0,
                waiting_tasks: 0,
                storage_bytes_granted: mode_pools.storage.storage_bytes_granted(),
                unroll_bytes_granted: mode_pools.storage.unroll_bytes_granted(),
            });
        }
        MemoryStats {
            default_mode: self.default_mode,
            page_size: self.page_size,
            policy: self.policy.name(),
            pools,
        }
    }
}

impl std::fmt::Debug for MemoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryManager")
            .field("default_mode", &self.default_mode)
            .field("page_size", &self.page_size)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::policy::StaticPartition;
    use proptest::prelude::*;
    use std::time::Duration;
    use teramem_common::config::SharingPolicyKind;
    use teramem_common::types::PoolCategory;
    use teramem_common::utils::bytes::MIB;
    use teramem_common::utils::error::Error;

    const A: TaskId = TaskId::new(1);
    const B: TaskId = TaskId::new(2);

    fn static_manager(on_heap_execution: u64, on_heap_storage: u64) -> MemoryManager {
        let config = MemoryConfig::default()
            .with_on_heap(on_heap_execution, on_heap_storage)
            .with_sharing_policy(SharingPolicyKind::StaticPartition);
        MemoryManager::new(&config).unwrap()
    }

    fn assert_within_capacity(manager: &MemoryManager) {
        for pool in manager.stats().pools {
            assert!(
                pool.memory_used <= pool.pool_size,
                "{} {} pool over capacity: {} > {}",
                pool.mode,
                pool.category,
                pool.memory_used,
                pool.pool_size
            );
        }
    }

    #[test]
    fn test_resolve_precedence() {
        let base = MemoryConfig::default();
        assert_eq!(resolve_memory_mode(&base, true), Ok(MemoryMode::OnHeap));

        let persistent = base.clone().with_persistent(MIB, "/tmp/pmem");
        assert_eq!(
            resolve_memory_mode(&persistent, true),
            Ok(MemoryMode::PersistentOffHeap)
        );

        let both = persistent.with_off_heap(MIB);
        assert_eq!(resolve_memory_mode(&both, true), Ok(MemoryMode::OffHeap));
    }

    #[test]
    fn test_resolve_rejects_bad_configs() {
        let zero_off_heap = MemoryConfig::default().with_off_heap(0);
        assert_eq!(
            resolve_memory_mode(&zero_off_heap, true),
            Err(ConfigError::ModeWithoutCapacity {
                mode: MemoryMode::OffHeap
            })
        );

        let off_heap = MemoryConfig::default().with_off_heap(MIB);
        assert_eq!(
            resolve_memory_mode(&off_heap, false),
            Err(ConfigError::UnalignedAccessUnsupported)
        );

        let zero_persistent = MemoryConfig::default()
            .with_off_heap(MIB)
            .with_persistent(0, "/tmp/pmem");
        assert_eq!(
            resolve_memory_mode(&zero_persistent, true),
            Err(ConfigError::ModeWithoutCapacity {
                mode: MemoryMode::PersistentOffHeap
            })
        );
    }

    #[test]
    fn test_construction_fails_on_unaligned_platform() {
        let config = MemoryConfig::default().with_off_heap(MIB);
        let result = MemoryManager::build(&config, Box::new(StaticPartition), false);
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::UnalignedAccessUnsupported))
        ));
    }

    #[test]
    fn test_pool_sizes_from_config() {
        let config = MemoryConfig::default()
            .with_on_heap(100, 200)
            .with_off_heap(1000)
            .with_storage_fraction(0.3)
            .with_page_size(MIB);
        let manager = MemoryManager::new(&config).unwrap();

        assert_eq!(manager.default_memory_mode(), MemoryMode::OffHeap);
        assert_eq!(manager.execution_pool_size(MemoryMode::OnHeap), 100);
        assert_eq!(manager.storage_pool_size(MemoryMode::OnHeap), 200);
        assert_eq!(manager.execution_pool_size(MemoryMode::OffHeap), 700);
        assert_eq!(manager.storage_pool_size(MemoryMode::OffHeap), 300);
        assert_eq!(manager.execution_pool_size(MemoryMode::PersistentOffHeap), 0);
        assert_eq!(manager.page_size(), MIB);
    }

    #[test]
    fn test_page_size_derived_from_selected_mode() {
        let config = MemoryConfig::default()
            .with_off_heap(4096 * MIB)
            .with_storage_fraction(0.5)
            .with_cores(4);
        let manager = MemoryManager::new(&config).unwrap();
        // 2048 MiB execution / 4 cores / 16 = 32 MiB
        assert_eq!(manager.page_size(), 32 * MIB);
    }

    #[test]
    fn test_fair_share_scenario() {
        let manager = static_manager(1000, 0);
        let mode = MemoryMode::OnHeap;

        assert_eq!(manager.acquire_execution_memory(600, A, mode), 600);
        let granted = manager.acquire_execution_memory(600, B, mode);
        assert_eq!(granted, 400);

        manager.release_execution_memory(400, A, mode);
        assert_eq!(manager.execution_memory_used_for_task(A), 200);
        assert_eq!(manager.acquire_execution_memory(400, B, mode), 400);
        assert_eq!(manager.execution_memory_used(mode), 1000);
        assert_within_capacity(&manager);
    }

    #[test]
    fn test_release_all_is_idempotent() {
        let manager = static_manager(1000, 1000);
        manager.acquire_execution_memory(300, A, MemoryMode::OnHeap);
        let before = manager.stats().pools;

        assert_eq!(manager.release_all_execution_memory_for_task(B), 0);
        assert_eq!(manager.stats().pools, before);

        assert_eq!(manager.release_all_execution_memory_for_task(A), 300);
        assert_eq!(manager.release_all_execution_memory_for_task(A), 0);
        assert_eq!(manager.execution_memory_used(MemoryMode::OnHeap), 0);
    }

    #[test]
    fn test_release_all_spans_modes() {
        let config = MemoryConfig::default()
            .with_on_heap(1000, 0)
            .with_off_heap(1000);
        let manager = MemoryManager::new(&config).unwrap();

        manager.acquire_execution_memory(100, A, MemoryMode::OnHeap);
        manager.acquire_execution_memory(200, A, MemoryMode::OffHeap);
        assert_eq!(manager.release_all_execution_memory_for_task(A), 300);
    }

    #[test]
    fn test_blocked_task_wakes_on_release() {
        let manager = static_manager(1000, 0);
        let mode = MemoryMode::OnHeap;
        assert_eq!(manager.acquire_execution_memory(1000, A, mode), 1000);

        crossbeam::scope(|s| {
            let waiter = s.spawn(|_| manager.acquire_execution_memory(300, B, mode));
            std::thread::sleep(Duration::from_millis(50));
            manager.release_execution_memory(500, A, mode);
            assert_eq!(waiter.join().unwrap(), 300);
        })
        .unwrap();

        assert_eq!(manager.execution_memory_used(mode), 800);
        assert_within_capacity(&manager);
    }

    #[test]
    fn test_interrupt_unblocks_waiter_and_keeps_grant() {
        let manager = static_manager(1000, 0);
        let mode = MemoryMode::OnHeap;
        assert_eq!(manager.acquire_execution_memory(1000, A, mode), 1000);

        crossbeam::scope(|s| {
            let waiter = s.spawn(|_| manager.acquire_execution_memory(300, B, mode));
            std::thread::sleep(Duration::from_millis(50));
            manager.interrupt_task(B);
            assert_eq!(waiter.join().unwrap(), 0);
        })
        .unwrap();

        assert_eq!(manager.execution_memory_used_for_task(A), 1000);
        assert_eq!(manager.release_all_execution_memory_for_task(B), 0);
    }

    #[test]
    fn test_waiter_receives_floor_before_peer_exceeds_half() {
        let manager = static_manager(1000, 0);
        let mode = MemoryMode::OnHeap;
        assert_eq!(manager.acquire_execution_memory(1000, A, mode), 1000);

        crossbeam::scope(|s| {
            let waiter = s.spawn(|_| manager.acquire_execution_memory(600, B, mode));
            std::thread::sleep(Duration::from_millis(50));

            // B is starving, so A cannot regrow past half while B waits.
            manager.release_execution_memory(600, A, mode);
            let b_granted = waiter.join().unwrap();
            assert!(b_granted >= 250, "B got only {b_granted}");
        })
        .unwrap();

        assert!(manager.execution_memory_used_for_task(A) <= 500);
        assert_within_capacity(&manager);
    }

    #[test]
    fn test_several_waiters_share_released_memory_fairly() {
        const CAPACITY: u64 = 1200;
        let manager = static_manager(CAPACITY, 0);
        let mode = MemoryMode::OnHeap;
        let holder = TaskId::new(100);
        assert_eq!(manager.acquire_execution_memory(CAPACITY, holder, mode), CAPACITY);

        let waiters = [TaskId::new(1), TaskId::new(2), TaskId::new(3)];
        let waiting = |m: &MemoryManager| {
            m.stats()
                .pool(mode, PoolCategory::Execution)
                .map_or(0, |p| p.waiting_tasks)
        };

        crossbeam::scope(|s| {
            let handles: Vec<_> = waiters
                .iter()
                .map(|&task| {
                    let manager = &manager;
                    s.spawn(move |_| manager.acquire_execution_memory(CAPACITY, task, mode))
                })
                .collect();

            for _ in 0..1000 {
                if waiting(&manager) == waiters.len() {
                    break;
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            assert_eq!(waiting(&manager), waiters.len());

            assert_eq!(manager.release_all_execution_memory_for_task(holder), CAPACITY);
            let n = waiters.len() as u64;
            for handle in handles {
                let granted = handle.join().unwrap();
                assert!(granted >= CAPACITY / (2 * n), "waiter got only {granted}");
                assert!(granted <= CAPACITY / 2, "waiter got {granted}");
            }
        })
        .unwrap();

        for task in waiters {
            assert!(manager.execution_memory_used_for_task(task) <= CAPACITY / 2);
        }
        assert_eq!(waiting(&manager), 0);
        assert_within_capacity(&manager);
    }

    #[test]
    fn test_unroll_counted_separately() {
        let manager = static_manager(0, 1000);
        let mode = MemoryMode::OnHeap;
        let block = BlockId::new("rdd_1_0");

        assert!(manager.acquire_unroll_memory(&block, 300, mode));
        let stats = manager.stats();
        let storage = stats.pool(mode, PoolCategory::Storage).unwrap();
        assert_eq!(storage.unroll_bytes_granted, 300);
        assert_eq!(storage.storage_bytes_granted, 0);
        assert_eq!(storage.memory_used, 300);

        assert!(manager.acquire_storage_memory(&block, 200, mode));
        let stats = manager.stats();
        let storage = stats.pool(mode, PoolCategory::Storage).unwrap();
        assert_eq!(storage.unroll_bytes_granted, 300);
        assert_eq!(storage.storage_bytes_granted, 200);
        assert_eq!(stats.total_used(), 500);
    }

    #[test]
    fn test_storage_acquire_and_limits() {
        let manager = static_manager(0, 100);
        let block = BlockId::new("rdd_0_0");

        assert!(!manager.acquire_storage_memory(&block, 101, MemoryMode::OnHeap));
        assert!(manager.acquire_storage_memory(&block, 60, MemoryMode::OnHeap));
        assert!(manager.acquire_unroll_memory(&block, 40, MemoryMode::OnHeap));
        assert!(!manager.acquire_storage_memory(&block, 1, MemoryMode::OnHeap));
        assert_eq!(manager.storage_memory_used(MemoryMode::OnHeap), 100);

        manager.release_unroll_memory(40, MemoryMode::OnHeap);
        assert_eq!(manager.storage_memory_used(MemoryMode::OnHeap), 60);
        manager.release_storage_memory(1000, MemoryMode::OnHeap);
        assert_eq!(manager.storage_memory_used(MemoryMode::OnHeap), 0);
    }

    #[test]
    fn test_release_all_storage_memory() {
        let config = MemoryConfig::default()
            .with_on_heap(0, 100)
            .with_off_heap(200);
        let manager = MemoryManager::new(&config).unwrap();
        let block = BlockId::new("b");
        assert!(manager.acquire_storage_memory(&block, 50, MemoryMode::OnHeap));
        assert!(manager.acquire_storage_memory(&block, 50, MemoryMode::OffHeap));

        manager.release_all_storage_memory();
        assert_eq!(manager.storage_memory_used(MemoryMode::OnHeap), 0);
        assert_eq!(manager.storage_memory_used(MemoryMode::OffHeap), 0);
    }

    #[test]
    fn test_unified_storage_borrows_from_execution() {
        let config = MemoryConfig::default()
            .with_on_heap(0, 0)
            .with_off_heap(1000)
            .with_sharing_policy(SharingPolicyKind::Unified);
        let manager = MemoryManager::new(&config).unwrap();
        let mode = MemoryMode::OffHeap;

        assert_eq!(manager.max_off_heap_storage_memory(), 1000);
        assert!(manager.acquire_storage_memory(&BlockId::new("big"), 800, mode));
        assert_eq!(manager.storage_pool_size(mode), 800);
        assert_eq!(manager.execution_pool_size(mode), 200);

        // Borrowed storage beyond the protected region has no evictor to
        // give it back, so execution only gets what is free.
        assert_eq!(manager.acquire_execution_memory(500, A, mode), 200);
        assert_within_capacity(&manager);
    }

    #[test]
    fn test_disabled_mode_grants_nothing() {
        let manager = static_manager(100, 100);
        let mode = MemoryMode::PersistentOffHeap;
        assert_eq!(manager.acquire_execution_memory(10, A, mode), 0);
        assert!(!manager.acquire_storage_memory(&BlockId::new("b"), 10, mode));
        assert_eq!(manager.max_persistent_storage_memory(), 0);
    }

    #[test]
    fn test_concurrent_storm_keeps_invariants() {
        let config = MemoryConfig::default()
            .with_on_heap(10_000, 10_000)
            .with_sharing_policy(SharingPolicyKind::Unified);
        let manager = MemoryManager::new(&config).unwrap();
        let mode = MemoryMode::OnHeap;

        crossbeam::scope(|s| {
            for t in 0..8u64 {
                let manager = &manager;
                s.spawn(move |_| {
                    let task = TaskId::new(t);
                    let block = BlockId::new(format!("block_{t}"));
                    for i in 0..200u64 {
                        let want = 50 + (i * 37 + t * 11) % 900;
                        let got = manager.acquire_execution_memory(want, task, mode);
                        if manager.acquire_storage_memory(&block, want / 2, mode) {
                            manager.release_storage_memory(want / 2, mode);
                        }
                        manager.release_execution_memory(got, task, mode);
                    }
                    manager.release_all_execution_memory_for_task(task);
                });
            }
        })
        .unwrap();

        assert_within_capacity(&manager);
        assert_eq!(manager.execution_memory_used(mode), 0);
        assert_eq!(manager.storage_memory_used(mode), 0);
        let stats = manager.stats();
        let on_heap_total: u64 = stats
            .pools
            .iter()
            .filter(|p| p.mode == mode)
            .map(|p| p.pool_size)
            .sum();
        assert_eq!(on_heap_total, 20_000);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Acquire(u64, u64),
        Release(u64, u64),
        ReleaseAll(u64),
        Store(u64),
        Unstore(u64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..4u64, 0..600u64).prop_map(|(t, n)| Op::Acquire(t, n)),
            (0..4u64, 0..600u64).prop_map(|(t, n)| Op::Release(t, n)),
            (0..4u64).prop_map(Op::ReleaseAll),
            (0..600u64).prop_map(Op::Store),
            (0..600u64).prop_map(Op::Unstore),
        ]
    }

    proptest! {
        #[test]
        fn prop_used_never_exceeds_capacity(ops in proptest::collection::vec(op(), 1..64)) {
            let config = MemoryConfig::default()
                .with_on_heap(2000, 1000)
                .with_sharing_policy(SharingPolicyKind::Unified);
            let manager = MemoryManager::new(&config).unwrap();
            let mode = MemoryMode::OnHeap;
            let block = BlockId::new("b");

            for op in ops {
                match op {
                    Op::Acquire(t, n) => {
                        // Interrupt first so a single thread never blocks.
                        manager.interrupt_task(TaskId::new(t));
                        manager.acquire_execution_memory(n, TaskId::new(t), mode);
                    }
                    Op::Release(t, n) => manager.release_execution_memory(n, TaskId::new(t), mode),
                    Op::ReleaseAll(t) => {
                        manager.release_all_execution_memory_for_task(TaskId::new(t));
                    }
                    Op::Store(n) => {
                        manager.acquire_storage_memory(&block, n, mode);
                    }
                    Op::Unstore(n) => manager.release_storage_memory(n, mode),
                }

                let stats = manager.stats();
                for pool in &stats.pools {
                    prop_assert!(pool.memory_used <= pool.pool_size);
                }
                let total: u64 = stats.pools.iter().filter(|p| p.mode == mode).map(|p| p.pool_size).sum();
                prop_assert_eq!(total, 3000);
            }
        }
    }
}
