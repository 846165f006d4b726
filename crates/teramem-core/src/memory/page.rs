//! Default page size for engine-internal allocations.

use teramem_common::utils::bytes::{MIB, next_power_of_two};

/// Smallest derived page size.
pub const MIN_PAGE_SIZE: u64 = MIB;

/// Largest derived page size.
pub const MAX_PAGE_SIZE: u64 = 64 * MIB;

/// Headroom divisor so each core can hold several pages at once.
pub const PAGE_SIZE_SAFETY_FACTOR: u64 = 16;

/// Derives a page size from the execution capacity of the selected mode.
///
/// `clamp(next_power_of_two(max_memory / cores / 16), 1 MiB, 64 MiB)`.
#[must_use]
pub fn default_page_size(max_memory: u64, cores: usize) -> u64 {
    let cores = cores.max(1) as u64;
    let size = next_power_of_two(max_memory / cores / PAGE_SIZE_SAFETY_FACTOR);
    size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
}
