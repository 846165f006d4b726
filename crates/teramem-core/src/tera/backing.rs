//! Byte ranges that regions are carved from.

use std::io;

/// Alignment of [`HeapBacking`] storage.
const HEAP_BACKING_ALIGN: usize = 64;

/// A contiguous, fixed-address byte range.
///
/// The range must not move for the lifetime of the backing: promoted
/// objects are addressed by raw address.
pub trait RegionBacking: Send {
    /// The mapped bytes.
    fn as_slice(&self) -> &[u8];

    /// The mapped bytes, writable.
    fn as_mut_slice(&mut self) -> &mut [u8];

    /// Makes written bytes durable. No-op for volatile backings.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be persisted.
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Volatile backing on the process heap, 64-byte aligned.
pub struct HeapBacking {
    bytes: Box<[u8]>,
    offset: usize,
    len: usize,
}

impl HeapBacking {
    /// Allocates `len` zeroed bytes.
    #[must_use]
    pub fn new(len: usize) -> Self {
        let bytes = vec![0u8; len + HEAP_BACKING_ALIGN].into_boxed_slice();
        let offset = bytes.as_ptr().align_offset(HEAP_BACKING_ALIGN);
        Self { bytes, offset, len }
    }
}

impl RegionBacking for HeapBacking {
    fn as_slice(&self) -> &[u8] {
        &self.bytes[self.offset..self.offset + self.len]
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes[self.offset..self.offset + self.len]
    }

    fn describe(&self) -> String {
        format!("heap ({} bytes)", self.len)
    }
}
