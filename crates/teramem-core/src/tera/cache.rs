//! The persistent-region allocator and its root stack.

use std::io;

use serde::Serialize;
use teramem_common::config::MemoryConfig;
use teramem_common::types::ObjectRef;
use teramem_common::utils::bytes::align_up;
use teramem_common::utils::error::{ConfigError, RegionError, Result};
use tracing::{debug, info};

use super::backing::RegionBacking;
use super::region::Region;
use super::roots::RootStack;

/// Counters describing a [`TeraCache`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeraStats {
    /// Bytes in the mapped space, after alignment.
    pub space_size: usize,
    /// Size of each region.
    pub region_size: usize,
    /// Regions opened so far.
    pub regions_opened: usize,
    /// Bytes used in the active region.
    pub region_used: usize,
    /// Bytes left in the active region.
    pub region_remaining: usize,
    /// Objects promoted since creation.
    pub objects_promoted: u64,
    /// Aligned bytes handed out since creation.
    pub bytes_promoted: u64,
    /// Roots waiting for a reachability pass.
    pub pending_roots: usize,
}

/// Process-wide persistent-tier context: mapped space, active region, and
/// root stack.
///
/// Constructed once and passed by reference to every promotion and
/// collection call site.
pub struct TeraCache {
    backing: Box<dyn RegionBacking>,
    /// Address of backing byte 0.
    base: usize,
    /// First usable (aligned) address of the space.
    space_start: usize,
    /// One past the last address of the space.
    space_stop: usize,
    region_size: usize,
    /// Where the next region will start.
    next_region: usize,
    region: Option<Region>,
    alignment: usize,
    roots: RootStack,
    regions_opened: usize,
    objects_promoted: u64,
    bytes_promoted: u64,
}

impl TeraCache {
    /// Wraps a backing. No region is open until [`tc_new_region`](Self::tc_new_region).
    ///
    /// `region_size` is rounded down to a multiple of `alignment`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the alignment is not a power of two
    /// or no aligned region fits the space.
    pub fn new(
        backing: Box<dyn RegionBacking>,
        region_size: usize,
        alignment: usize,
    ) -> Result<Self> {
        if !alignment.is_power_of_two() {
            return Err(ConfigError::InvalidAlignment(alignment).into());
        }

        let bytes = backing.as_slice();
        let base = bytes.as_ptr() as usize;
        let space_stop = base + bytes.len();
        let space_start = align_up(base, alignment)
            .unwrap_or(space_stop)
            .min(space_stop);

        let region_size = region_size & !(alignment - 1);
        if region_size == 0 || region_size > space_stop - space_start {
            return Err(ConfigError::InvalidRegionSize {
                region_size: region_size as u64,
                space_size: (space_stop - space_start) as u64,
            }
            .into());
        }

        info!(
            "Persistent space ready: {} ({} bytes, {}-byte regions)",
            backing.describe(),
            space_stop - space_start,
            region_size
        );

        Ok(Self {
            backing,
            base,
            space_start,
            space_stop,
            region_size,
            next_region: space_start,
            region: None,
            alignment,
            roots: RootStack::new(),
            regions_opened: 0,
            objects_promoted: 0,
            bytes_promoted: 0,
        })
    }

    /// Wraps a backing using region size and alignment from `config`.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn with_config(backing: Box<dyn RegionBacking>, config: &MemoryConfig) -> Result<Self> {
        let region_size = usize::try_from(config.region_size()).unwrap_or(usize::MAX);
        Self::new(backing, region_size, config.object_alignment)
    }

    /// Returns true if `addr` lies in the persistent space.
    ///
    /// O(1). Covers every region opened so far, so objects promoted into
    /// earlier regions still classify as persistent.
    #[inline]
    #[must_use]
    pub fn tc_check(&self, addr: usize) -> bool {
        self.space_start <= addr && addr < self.space_stop
    }

    /// [`tc_check`](Self::tc_check) for an object reference.
    #[inline]
    #[must_use]
    pub fn contains(&self, obj: ObjectRef) -> bool {
        self.tc_check(obj.addr())
    }

    /// Opens the next region and resets the cursor to its start.
    ///
    /// Objects in the previous region stay where they are.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::SpaceExhausted`] if no full region is left.
    pub fn tc_new_region(&mut self) -> std::result::Result<(), RegionError> {
        let remaining = self.space_stop - self.next_region;
        if remaining < self.region_size {
            return Err(RegionError::SpaceExhausted {
                remaining,
                region_size: self.region_size,
            });
        }

        let start = self.next_region;
        self.next_region += self.region_size;
        self.region = Some(Region::new(start, self.next_region));
        self.regions_opened += 1;
        info!(
            "Opened persistent region {} at offset {}",
            self.regions_opened,
            start - self.space_start
        );
        Ok(())
    }

    /// Current allocation cursor. The space start if no region is open.
    #[must_use]
    pub fn tc_get_addr_region(&self) -> usize {
        self.region.map_or(self.space_start, |r| r.top())
    }

    /// Reserves room for the promoted copy of `obj` in the active region.
    ///
    /// `size` is rounded up to the object alignment, and a zero-size object
    /// still takes one aligned slot so no two objects share an address.
    /// Returns the address of the new copy.
    ///
    /// # Errors
    ///
    /// Fails without touching the cursor if no region is open or the
    /// region cannot fit the request. Opening a new region or collecting
    /// is up to the caller.
    pub fn tc_region_top(
        &mut self,
        obj: ObjectRef,
        size: usize,
    ) -> std::result::Result<ObjectRef, RegionError> {
        let region = self.region.as_mut().ok_or(RegionError::NoActiveRegion)?;
        let remaining = region.remaining();
        let aligned = align_up(size.max(1), self.alignment).ok_or(RegionError::Exhausted {
            requested: size,
            remaining,
        })?;
        let Some(addr) = region.bump(aligned) else {
            debug!(
                "Region exhausted promoting {}: {} bytes requested, {} remaining",
                obj, aligned, remaining
            );
            return Err(RegionError::Exhausted {
                requested: aligned,
                remaining,
            });
        };

        self.objects_promoted += 1;
        self.bytes_promoted += aligned as u64;
        Ok(ObjectRef::from_addr(addr))
    }

    /// Pushes a root for the next persistent-tier reachability pass.
    pub fn add_root_stack(&mut self, obj: ObjectRef) {
        self.roots.push(obj);
    }

    /// Pops the most recently pushed root.
    ///
    /// # Panics
    ///
    /// Panics if no roots are pending.
    pub fn get_root_stack(&mut self) -> ObjectRef {
        self.roots.pop()
    }

    /// Pops every pending root, most recent first.
    pub fn drain_roots(&mut self) -> impl Iterator<Item = ObjectRef> + '_ {
        self.roots.drain()
    }

    /// Number of roots waiting for a reachability pass.
    #[must_use]
    pub fn pending_roots(&self) -> usize {
        self.roots.len()
    }

    /// Copies `payload` into the active region as the promoted form of
    /// `obj`, pushing it as a root if it is still reachable from the heap.
    ///
    /// # Errors
    ///
    /// Same as [`tc_region_top`](Self::tc_region_top); nothing is written
    /// or pushed on failure.
    pub fn promote(
        &mut self,
        obj: ObjectRef,
        payload: &[u8],
        reachable: bool,
    ) -> std::result::Result<ObjectRef, RegionError> {
        let new_addr = self.tc_region_top(obj, payload.len())?;
        let offset = new_addr.addr() - self.base;
        self.backing.as_mut_slice()[offset..offset + payload.len()].copy_from_slice(payload);
        if reachable {
            self.add_root_stack(new_addr);
        }
        Ok(new_addr)
    }

    /// Reads `len` bytes of a promoted object.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::OutOfBounds`] if the range was never handed out.
    pub fn object_bytes(
        &self,
        obj: ObjectRef,
        len: usize,
    ) -> std::result::Result<&[u8], RegionError> {
        let addr = obj.addr();
        let frontier = self.tc_get_addr_region();
        let end = addr.checked_add(len);
        match end {
            Some(end) if addr >= self.space_start && end <= frontier => {
                let offset = addr - self.base;
                Ok(&self.backing.as_slice()[offset..offset + len])
            }
            _ => Err(RegionError::OutOfBounds { addr, len }),
        }
    }

    /// Persists everything written so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing cannot be flushed.
    pub fn flush(&self) -> io::Result<()> {
        self.backing.flush()
    }

    /// The active region, if any.
    #[must_use]
    pub fn region(&self) -> Option<&Region> {
        self.region.as_ref()
    }

    /// First usable address of the space.
    #[must_use]
    pub fn space_start(&self) -> usize {
        self.space_start
    }

    /// Object alignment.
    #[must_use]
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> TeraStats {
        TeraStats {
            space_size: self.space_stop - self.space_start,
            region_size: self.region_size,
            regions_opened: self.regions_opened,
            region_used: self.region.map_or(0, |r| r.used()),
            region_remaining: self.region.map_or(0, |r| r.remaining()),
            objects_promoted: self.objects_promoted,
            bytes_promoted: self.bytes_promoted,
            pending_roots: self.roots.len(),
        }
    }
}

impl std::fmt::Debug for TeraCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeraCache")
            .field("backing", &self.backing.describe())
            .field("space_start", &self.space_start)
            .field("space_stop", &self.space_stop)
            .field("region", &self.region)
            .field("pending_roots", &self.roots.len())
            .finish_non_exhaustive()
    }
}
