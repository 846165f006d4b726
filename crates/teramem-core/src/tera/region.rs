//! A bump-allocated address range.

/// `[start, stop)` with a cursor that only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    start: usize,
    stop: usize,
    top: usize,
}

impl Region {
    /// Creates an empty region over `[start, stop)`.
    #[must_use]
    pub fn new(start: usize, stop: usize) -> Self {
        debug_assert!(start <= stop);
        Self {
            start,
            stop,
            top: start,
        }
    }

    /// First address.
    #[must_use]
    pub fn start(&self) -> usize {
        self.start
    }

    /// One past the last address.
    #[must_use]
    pub fn stop(&self) -> usize {
        self.stop
    }

    /// Next address to hand out.
    #[must_use]
    pub fn top(&self) -> usize {
        self.top
    }

    /// Bytes already handed out.
    #[must_use]
    pub fn used(&self) -> usize {
        self.top - self.start
    }

    /// Bytes left.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.stop - self.top
    }

    /// Returns true if `addr` lies in `[start, stop)`.
    #[inline]
    #[must_use]
    pub fn contains(&self, addr: usize) -> bool {
        self.start <= addr && addr < self.stop
    }

    /// Hands out `size` bytes at the cursor, or `None` without moving it.
    pub fn bump(&mut self, size: usize) -> Option<usize> {
        if size > self.remaining() {
            return None;
        }
        let addr = self.top;
        self.top += size;
        Some(addr)
    }
}
