//! File-backed persistent space.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};
use teramem_core::tera::RegionBacking;

/// A persistent space mapped from a file, such as one on a DAX or ramdisk
/// mount.
///
/// The file is created if missing and grown to the requested size. Its
/// contents are treated as opaque bytes.
pub struct MmapBacking {
    path: PathBuf,
    /// Kept open for the lifetime of the mapping.
    _file: File,
    mmap: MmapMut,
}

impl MmapBacking {
    /// Opens or creates `path` and maps its first `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, resized, or mapped.
    pub fn open(path: impl AsRef<Path>, size: usize) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot map an empty persistent space",
            ));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        if file.metadata()?.len() < size as u64 {
            file.set_len(size as u64)?;
        }

        // SAFETY: the file stays open for as long as the mapping lives, and
        // the backing file is owned by this process for its lifetime.
        #[allow(unsafe_code)]
        let mmap = unsafe { MmapOptions::new().len(size).map_mut(&file)? };

        Ok(Self {
            path,
            _file: file,
            mmap,
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mapped length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if nothing is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}

impl RegionBacking for MmapBacking {
    fn as_slice(&self) -> &[u8] {
        &self.mmap
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.mmap
    }

    fn flush(&self) -> io::Result<()> {
        self.mmap.flush()
    }

    fn describe(&self) -> String {
        format!("mmap {} ({} bytes)", self.path.display(), self.mmap.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use teramem_common::types::ObjectRef;
    use teramem_core::tera::TeraCache;

    #[test]
    fn test_open_creates_and_sizes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pmem.img");

        let backing = MmapBacking::open(&path, 8192).unwrap();
        assert_eq!(backing.len(), 8192);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 8192);
    }

    #[test]
    fn test_empty_space_rejected() {
        let dir = tempdir().unwrap();
        assert!(MmapBacking::open(dir.path().join("pmem.img"), 0).is_err());
    }

    #[test]
    fn test_promoted_bytes_reach_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pmem.img");

        let backing = MmapBacking::open(&path, 4096).unwrap();
        let mut tc = TeraCache::new(Box::new(backing), 4096, 8).unwrap();
        tc.tc_new_region().unwrap();
        tc.promote(ObjectRef::from_addr(0x40), b"persisted", true)
            .unwrap();
        tc.flush().unwrap();
        drop(tc);

        let contents = std::fs::read(&path).unwrap();
        assert_eq!(&contents[..9], b"persisted");
    }

    #[test]
    fn test_mapping_is_page_aligned() {
        let dir = tempdir().unwrap();
        let backing = MmapBacking::open(dir.path().join("pmem.img"), 4096).unwrap();
        assert_eq!(backing.as_slice().as_ptr() as usize % 4096, 0);
    }
}
