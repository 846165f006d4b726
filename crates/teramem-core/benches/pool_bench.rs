//! Benchmarks for the acquisition paths.

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use teramem_common::config::{MemoryConfig, SharingPolicyKind};
use teramem_common::types::{BlockId, MemoryMode, ObjectRef, TaskId};
use teramem_core::memory::MemoryManager;
use teramem_core::tera::{HeapBacking, TeraCache};

fn bench_execution_acquire_release(c: &mut Criterion) {
    let config = MemoryConfig::default()
        .with_on_heap(1 << 30, 1 << 30)
        .with_sharing_policy(SharingPolicyKind::Unified);
    let manager = MemoryManager::new(&config).unwrap();
    let task = TaskId::new(1);

    c.bench_function("execution_acquire_release", |b| {
        b.iter(|| {
            let granted = manager.acquire_execution_memory(black_box(4096), task, MemoryMode::OnHeap);
            manager.release_execution_memory(granted, task, MemoryMode::OnHeap);
        });
    });
}

fn bench_storage_acquire_release(c: &mut Criterion) {
    let config = MemoryConfig::default().with_on_heap(1 << 30, 1 << 30);
    let manager = MemoryManager::new(&config).unwrap();
    let block = BlockId::new("bench");

    c.bench_function("storage_acquire_release", |b| {
        b.iter(|| {
            if manager.acquire_storage_memory(&block, black_box(4096), MemoryMode::OnHeap) {
                manager.release_storage_memory(4096, MemoryMode::OnHeap);
            }
        });
    });
}

fn bench_region_top(c: &mut Criterion) {
    c.bench_function("tc_region_top", |b| {
        b.iter_batched(
            || {
                let mut tc = TeraCache::new(Box::new(HeapBacking::new(1 << 20)), 1 << 20, 8).unwrap();
                tc.tc_new_region().unwrap();
                tc
            },
            |mut tc| {
                while tc.tc_region_top(ObjectRef::from_addr(1), black_box(48)).is_ok() {}
                tc
            },
            criterion::BatchSize::LargeInput,
        );
    });
}

criterion_group!(
    benches,
    bench_execution_acquire_release,
    bench_storage_acquire_release,
    bench_region_top
);
criterion_main!(benches);
