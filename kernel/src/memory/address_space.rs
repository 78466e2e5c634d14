//! Per-process address space: region arena + amap table + MMU context,
//! under one lock.
//!
//! Grounded on `memory::process_memory`'s map/unmap/update_page_flags idiom
//! (kept for the "unmap before remap" PROTECTION-fault pattern) generalized
//! from a flat per-process struct into the region/amap/arena model this
//! module composes.

use crate::error::KernelError;
use crate::memory::amap::{Amap, AmapId};
use crate::memory::frame_allocator::{allocate_frame, deallocate_frame};
use crate::memory::mmu_context::MmuContext;
use crate::memory::region::{MapFlags, ObjectHandle, PlacementSpec, Protection, Region, RegionArena, RegionState, PAGE_SIZE};
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use spin::Mutex;
#[cfg(target_arch = "x86_64")]
use x86_64::{
    structures::paging::{Page, PageTableFlags, Size4KiB},
    VirtAddr,
};
#[cfg(not(target_arch = "x86_64"))]
use crate::memory::arch_stub::{Page, PageTableFlags, Size4KiB, VirtAddr};

static NEXT_AMAP_ID: AtomicU64 = AtomicU64::new(1);

fn protection_to_pte_flags(prot: Protection, user: bool) -> PageTableFlags {
    let mut flags = PageTableFlags::PRESENT;
    if prot.contains(Protection::WRITE) {
        flags |= PageTableFlags::WRITABLE;
    }
    if !prot.contains(Protection::EXEC) {
        flags |= PageTableFlags::NO_EXECUTE;
    }
    if user {
        flags |= PageTableFlags::USER_ACCESSIBLE;
    }
    flags
}

/// One process's (or the kernel's) virtual address space.
pub struct AddressSpace {
    base: u64,
    size: u64,
    /// Kernel address spaces prefault and lock every page of a new mapping
    /// immediately (`memory::address_space::AddressSpace::map`'s MLOCK path).
    mlock: bool,
    state: Mutex<AddressSpaceState>,
    mmu: Mutex<MmuContext>,
    /// CPUs currently running with this address space loaded.
    cpu_refcount: AtomicUsize,
}

struct AddressSpaceState {
    regions: RegionArena,
    amaps: BTreeMap<AmapId, Arc<Amap>>,
}

impl AddressSpace {
    pub fn new(base: u64, size: u64, mlock: bool) -> Result<Self, KernelError> {
        let mmu = MmuContext::new().map_err(|_| KernelError::NoMemory)?;
        Ok(Self {
            base,
            size,
            mlock,
            state: Mutex::new(AddressSpaceState {
                regions: RegionArena::new(base, size),
                amaps: BTreeMap::new(),
            }),
            mmu: Mutex::new(mmu),
            cpu_refcount: AtomicUsize::new(0),
        })
    }

    fn alloc_amap(&self, state: &mut AddressSpaceState, max_size: usize) -> AmapId {
        let id = AmapId(NEXT_AMAP_ID.fetch_add(1, Ordering::Relaxed));
        state.amaps.insert(id, Amap::new(id, max_size));
        id
    }

    /// `map(spec, size, prot, flags, obj?, offset?, name?) -> addr`.
    pub fn map(
        &self,
        spec: PlacementSpec,
        size: u64,
        prot: Protection,
        flags: MapFlags,
        object: Option<ObjectHandle>,
        object_offset: u64,
        name: Option<&'static str>,
    ) -> Result<u64, KernelError> {
        let mut state = self.state.lock();

        let needs_amap = object.is_none() || flags.contains(MapFlags::PRIVATE);
        let amap_id = if needs_amap {
            Some(self.alloc_amap(&mut state, (size / PAGE_SIZE) as usize))
        } else {
            None
        };

        let region = state.regions.map(
            spec,
            size,
            prot,
            flags,
            object,
            object_offset,
            amap_id.map(|id| id.0),
            name,
        )?;

        if self.mlock {
            if let Err(e) = self.prefault_range(&mut state, &region) {
                // Revert the whole range back to FREE on OOM, per the
                // kernel eager-mapping contract.
                let _ = state.regions.unmap(region.start, region.size);
                return Err(e);
            }
        }

        Ok(region.start)
    }

    fn prefault_range(&self, state: &mut AddressSpaceState, region: &Region) -> Result<(), KernelError> {
        let mut mmu = self.mmu.lock();
        let pages = region.size / PAGE_SIZE;
        for i in 0..pages {
            let frame = allocate_frame().ok_or(KernelError::NoMemory)?;
            let addr = region.start + i * PAGE_SIZE;
            let page = Page::<Size4KiB>::containing_address(VirtAddr::new(addr));
            let pte_flags = protection_to_pte_flags(region.prot, false);
            mmu.map_page(page, frame, pte_flags).map_err(|_| KernelError::Fatal)?;
            if let Some(amap_id) = region.amap.map(AmapId) {
                if let Some(amap) = state.amaps.get(&amap_id) {
                    amap.install(i as usize, frame);
                }
            }
        }
        Ok(())
    }

    /// `unmap(start, size)`: mark FREE, unmapping every page and releasing
    /// amaps/objects for the allocated regions that covered the range.
    pub fn unmap(&self, start: u64, size: u64) -> Result<(), KernelError> {
        let mut state = self.state.lock();
        let released = state.regions.unmap(start, size)?;

        let mut mmu = self.mmu.lock();
        for region in &released {
            self.release_region_pages(&mut state.amaps, &mut mmu, region);
        }
        Ok(())
    }

    fn release_region_pages(
        &self,
        amaps: &mut BTreeMap<AmapId, Arc<Amap>>,
        mmu: &mut MmuContext,
        region: &Region,
    ) {
        let pages = region.size / PAGE_SIZE;
        for i in 0..pages {
            let addr = region.start + i * PAGE_SIZE;
            let page = Page::<Size4KiB>::containing_address(VirtAddr::new(addr));
            let _ = mmu.unmap_page(page);
        }

        if let Some(amap_id) = region.amap.map(AmapId) {
            if let Some(amap) = amaps.get(&amap_id) {
                for i in 0..pages as usize {
                    if let Some(should_free) = amap.clear(i) {
                        if should_free {
                            if let Some(frame) = amap.get(i) {
                                deallocate_frame(frame);
                            }
                        }
                    }
                }
                if amap.release() {
                    amaps.remove(&amap_id);
                }
            }
        }
    }

    pub fn reserve(&self, start: u64, size: u64) -> Result<(), KernelError> {
        self.state.lock().regions.reserve(start, size)
    }

    /// Page-fault entry point; see `memory::fault` for the actual matrix.
    pub fn handle_fault(
        &self,
        addr: u64,
        reason: crate::memory::fault::FaultReason,
        access: Protection,
    ) -> Result<(), KernelError> {
        crate::memory::fault::handle(self, addr, reason, access)
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut RegionArena, &mut BTreeMap<AmapId, Arc<Amap>>) -> R) -> R {
        let mut state = self.state.lock();
        let AddressSpaceState { regions, amaps } = &mut *state;
        f(regions, amaps)
    }

    pub(crate) fn mmu_lock(&self) -> spin::MutexGuard<'_, MmuContext> {
        self.mmu.lock()
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// `switch(as)`: load this address space's MMU context on the current
    /// CPU, bumping its CPU refcount. Caller drops the previous space's
    /// guard (releasing its refcount) separately.
    pub fn switch_to(&self) {
        self.cpu_refcount.fetch_add(1, Ordering::AcqRel);
        self.mmu.lock().switch_to();
    }

    pub fn release_cpu(&self) {
        self.cpu_refcount.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn cpu_refcount(&self) -> usize {
        self.cpu_refcount.load(Ordering::Acquire)
    }

    /// `clone()`: mirror every ALLOCATED region into a new address space.
    /// Shared (non-PRIVATE) regions share the amap; PRIVATE regions fork a
    /// fresh amap with the source pages write-protected for CoW.
    pub fn clone_address_space(&self) -> Result<Self, KernelError> {
        let child = Self::new(self.base, self.size, self.mlock)?;

        let mut parent_state = self.state.lock();
        let mut parent_mmu = self.mmu.lock();
        let mut child_state = child.state.lock();

        let source_regions: alloc::vec::Vec<Region> =
            parent_state.regions.iter_allocated().cloned().collect();

        for region in source_regions {
            let private = region.flags.contains(MapFlags::PRIVATE);

            let child_amap_id = match region.amap.map(AmapId) {
                Some(src_amap_id) if !private => {
                    if let Some(src_amap) = parent_state.amaps.get(&src_amap_id) {
                        src_amap.add_ref();
                        child_state.amaps.insert(src_amap_id, src_amap.clone());
                    }
                    Some(src_amap_id)
                }
                Some(src_amap_id) => {
                    let dst_id = AmapId(NEXT_AMAP_ID.fetch_add(1, Ordering::Relaxed));
                    let dst_amap = Amap::new(dst_id, (region.size / PAGE_SIZE) as usize);
                    if let Some(src_amap) = parent_state.amaps.get(&src_amap_id) {
                        for i in 0..(region.size / PAGE_SIZE) as usize {
                            if let Some(frame) = src_amap.get(i) {
                                crate::memory::frame_metadata::frame_incref(frame);
                                dst_amap.install(i, frame);

                                let addr = region.start + (i as u64) * PAGE_SIZE;
                                let page = Page::<Size4KiB>::containing_address(VirtAddr::new(addr));
                                if let Some((_, flags)) = parent_mmu.get_page_info(page) {
                                    let cow_flags = crate::memory::mmu_context::make_cow_flags(flags);
                                    let _ = parent_mmu.update_page_flags(page, cow_flags);
                                }
                            }
                        }
                    }
                    child_state.amaps.insert(dst_id, dst_amap);
                    Some(dst_id)
                }
                None => None,
            };

            let cloned = Region {
                amap: child_amap_id.map(|id| id.0),
                ..region
            };
            child_state
                .regions
                .map(
                    PlacementSpec::Exact { start: cloned.start },
                    cloned.size,
                    cloned.prot,
                    cloned.flags,
                    cloned.object,
                    cloned.object_offset,
                    cloned.amap,
                    cloned.name,
                )
                .map_err(|_| KernelError::Fatal)?;
        }

        drop(child_state);
        drop(parent_mmu);
        drop(parent_state);
        Ok(child)
    }

    /// `destroy()`: detach this space from every CPU still using it via an
    /// abstract remote cross-call, then tear down all regions. Still fails
    /// with `InUse` if a CPU remains attached after the cross-call returns.
    pub fn destroy(&self) -> Result<(), KernelError> {
        if self.cpu_refcount() != 0 {
            super::cross_call::detach_all_cpus(self);
        }
        if self.cpu_refcount() != 0 {
            return Err(KernelError::InUse);
        }
        let mut state = self.state.lock();
        let mut mmu = self.mmu.lock();
        let all: alloc::vec::Vec<Region> = state.regions.iter_allocated().cloned().collect();
        for region in &all {
            self.release_region_pages(&mut state.amaps, &mut mmu, region);
        }
        let _ = state.regions.unmap(self.base, self.size);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn map_unmap_round_trip() {
        let space = AddressSpace::new(0x4000_0000, 0x1000_0000, false).unwrap();
        let addr = space
            .map(PlacementSpec::Any, 0x1000, Protection::READ | Protection::WRITE, MapFlags::PRIVATE, None, 0, None)
            .unwrap();
        assert!(addr >= 0x4000_0000);
        space.unmap(addr, 0x1000).unwrap();
    }

    #[test_case]
    fn reserve_then_map_any_skips_it() {
        let space = AddressSpace::new(0x4000_0000, 0x1000_0000, false).unwrap();
        space.reserve(0x4000_0000, 0x2000).unwrap();
        let addr = space
            .map(PlacementSpec::Any, 0x1000, Protection::READ, MapFlags::NONE, None, 0, None)
            .unwrap();
        assert!(addr >= 0x4000_2000);
    }
}
