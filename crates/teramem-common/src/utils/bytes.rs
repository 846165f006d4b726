//! Byte-size arithmetic.

/// One mebibyte.
pub const MIB: u64 = 1024 * 1024;

/// One gibibyte.
pub const GIB: u64 = 1024 * MIB;

/// Returns the smallest power of two `>= n`. `0` maps to `1`.
///
/// Saturates at the largest power of two representable in `u64`.
#[must_use]
pub fn next_power_of_two(n: u64) -> u64 {
    if n == 0 {
        return 1;
    }
    n.checked_next_power_of_two().unwrap_or(1 << 63)
}

/// Rounds `n` up to a multiple of `align`, which must be a power of two.
///
/// Returns `None` on overflow.
#[inline]
#[must_use]
pub fn align_up(n: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    n.checked_add(align - 1).map(|v| v & !(align - 1))
}

/// Formats a byte count for humans (`1.5 GiB`, `512 B`).
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
