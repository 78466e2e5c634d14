//! Anonymous map: per-region table of physical pages backing anonymous
//! (non-file) memory, with copy-on-write sharing across `clone()`d address
//! spaces.
//!
//! Physical-page refcounting is `memory::frame_metadata` (already built for
//! this purpose); an amap additionally tracks, per slot, how many *regions*
//! point at that slot (`rref`) — distinct from the page's own refcount,
//! which counts amap slots across all address spaces.

use crate::memory::frame_metadata;
use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;
#[cfg(target_arch = "x86_64")]
use x86_64::{structures::paging::PhysFrame, PhysAddr};
#[cfg(not(target_arch = "x86_64"))]
use crate::memory::arch_stub::{PhysAddr, PhysFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AmapId(pub u64);

#[derive(Clone, Copy)]
struct Slot {
    frame: Option<PhysFrame>,
    /// Regions referring to this slot. Saturating; allocation fails rather
    /// than wrap once it hits `u16::MAX`.
    rref: u16,
}

impl Slot {
    const EMPTY: Self = Self { frame: None, rref: 0 };
}

struct AmapInner {
    slots: Vec<Slot>,
    curr_size: usize,
    refcount: usize,
}

/// One amap, sized to the region it backs (`max_size = region_size /
/// PAGE_SIZE`). Shared by `Arc` across regions/address spaces that alias it
/// (non-PRIVATE `clone()`); `refcount` additionally tracks explicit
/// ref-counted lifetime for cases where an `Arc` alone isn't descriptive
/// enough for logging/diagnostics.
pub struct Amap {
    id: AmapId,
    inner: Mutex<AmapInner>,
}

impl Amap {
    pub fn new(id: AmapId, max_size: usize) -> Arc<Self> {
        Arc::new(Self {
            id,
            inner: Mutex::new(AmapInner {
                slots: alloc::vec![Slot::EMPTY; max_size],
                curr_size: 0,
                refcount: 1,
            }),
        })
    }

    pub fn id(&self) -> AmapId {
        self.id
    }

    pub fn max_size(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn curr_size(&self) -> usize {
        self.inner.lock().curr_size
    }

    pub fn add_ref(&self) {
        self.inner.lock().refcount += 1;
    }

    /// Returns `true` once the last reference is gone and the caller should
    /// release every slot's page and drop the amap.
    pub fn release(&self) -> bool {
        let mut inner = self.inner.lock();
        inner.refcount = inner.refcount.saturating_sub(1);
        inner.refcount == 0
    }

    pub fn get(&self, index: usize) -> Option<PhysFrame> {
        self.inner.lock().slots.get(index).and_then(|s| s.frame)
    }

    /// Install a fresh, privately-owned page at `index` (refcount 1).
    pub fn install(&self, index: usize, frame: PhysFrame) {
        let mut inner = self.inner.lock();
        let was_empty = inner.slots[index].frame.is_none();
        inner.slots[index] = Slot { frame: Some(frame), rref: 1 };
        if was_empty {
            inner.curr_size += 1;
        }
        frame_metadata::frame_register(frame);
    }

    /// Remove the page at `index`, dropping the amap's reference to it.
    /// Returns `true` if the underlying frame's refcount reached zero and
    /// the caller should free it.
    pub fn clear(&self, index: usize) -> Option<bool> {
        let mut inner = self.inner.lock();
        let slot = inner.slots.get_mut(index)?;
        let frame = slot.frame.take()?;
        slot.rref = 0;
        inner.curr_size -= 1;
        Some(frame_metadata::frame_decref(frame))
    }

    /// Bump a slot's region-reference count for a new `clone()`d region
    /// sharing this amap at `index`. Saturating; fails once `rref` would
    /// overflow `u16`.
    pub fn bump_rref(&self, index: usize) -> Result<(), crate::error::KernelError> {
        let mut inner = self.inner.lock();
        let slot = &mut inner.slots[index];
        if slot.rref == u16::MAX {
            return Err(crate::error::KernelError::Overflow);
        }
        slot.rref = slot.rref.saturating_add(1);
        Ok(())
    }

    pub fn rref(&self, index: usize) -> u16 {
        self.inner.lock().slots.get(index).map(|s| s.rref).unwrap_or(0)
    }

    /// Refcount of the physical page backing `index` (1 = private, >1 =
    /// shared/CoW), per `frame_metadata`.
    pub fn page_refcount(&self, index: usize) -> u32 {
        match self.get(index) {
            Some(frame) => frame_metadata::frame_refcount(frame),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_frame(addr: u64) -> PhysFrame {
        PhysFrame::containing_address(PhysAddr::new(addr))
    }

    #[test_case]
    fn install_then_clear_roundtrip() {
        let amap = Amap::new(AmapId(1), 4);
        assert_eq!(amap.curr_size(), 0);

        amap.install(0, test_frame(0x9000_0000));
        assert_eq!(amap.curr_size(), 1);
        assert_eq!(amap.page_refcount(0), 1);

        assert_eq!(amap.clear(0), Some(true));
        assert_eq!(amap.curr_size(), 0);
        assert!(amap.get(0).is_none());
    }

    #[test_case]
    fn rref_saturates_without_overflow() {
        let amap = Amap::new(AmapId(2), 1);
        amap.install(0, test_frame(0xA000_0000));
        for _ in 0..10 {
            amap.bump_rref(0).unwrap();
        }
        assert_eq!(amap.rref(0), 11);
        amap.clear(0);
    }

    #[test_case]
    fn release_reports_last_reference() {
        let amap = Amap::new(AmapId(3), 1);
        amap.add_ref();
        assert!(!amap.release());
        assert!(amap.release());
    }
}
