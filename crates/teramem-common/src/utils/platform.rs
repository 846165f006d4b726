//! Host capability checks.

/// Returns true if the target tolerates unaligned word loads and stores.
///
/// Off-heap buffers pack records without padding, so off-heap mode is only
/// allowed where this holds.
#[must_use]
pub const fn supports_unaligned_access() -> bool {
    cfg!(any(
        target_arch = "x86",
        target_arch = "x86_64",
        target_arch = "aarch64",
        target_arch = "powerpc64",
        target_arch = "s390x",
        target_arch = "loongarch64",
    ))
}

/// Number of cores available to this process, at least 1.
#[must_use]
pub fn available_cores() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}
