//! Page-fault handler: the anonymous fault matrix and the object-backed
//! (no-amap) fault path.
//!
//! Grounded on `memory::process_memory`'s "unmap before remap" idiom for
//! PROTECTION faults (kept: a PTE is always removed before its replacement
//! is installed, never updated in place) and `memory::cow_stats` for the
//! counters a CoW fault bumps. The matrix itself has no teacher precedent —
//! the teacher's fault entry point lives in the trimmed `interrupts/`
//! module — so this is freshly built straight from the documented table.

use crate::error::KernelError;
use crate::memory::address_space::AddressSpace;
use crate::memory::amap::AmapId;
use crate::memory::cow_stats;
use crate::memory::frame_allocator::{allocate_frame, deallocate_frame};
use crate::memory::frame_metadata;
use crate::memory::mmu_context::{make_cow_flags, make_private_flags};
use crate::memory::object::{Ext2FileObject, ObjectProvider};
use crate::memory::region::{ObjectHandle, Protection, RegionState, PAGE_SIZE};
#[cfg(target_arch = "x86_64")]
use x86_64::{
    structures::paging::{Page, PageTableFlags, PhysFrame, Size4KiB},
    VirtAddr,
};
#[cfg(not(target_arch = "x86_64"))]
use crate::memory::arch_stub::{Page, PageTableFlags, PhysFrame, Size4KiB, VirtAddr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultReason {
    NotPresent,
    Protection,
}

/// Recursive-fault guard: set while a thread holds the address-space lock
/// performing a VM operation, so a fault taken while already inside one is
/// refused rather than deadlocking. A real kernel keys this per-thread
/// (TLS); this crate slice carries no per-CPU/task module to anchor that
/// to, so it is modeled as a single process-wide flag.
static IN_VM_OPERATION: core::sync::atomic::AtomicBool = core::sync::atomic::AtomicBool::new(false);

struct RecursionScope;

impl RecursionScope {
    fn enter() -> Result<Self, KernelError> {
        if IN_VM_OPERATION.swap(true, core::sync::atomic::Ordering::AcqRel) {
            return Err(KernelError::InvalidAddr);
        }
        Ok(Self)
    }
}

impl Drop for RecursionScope {
    fn drop(&mut self) {
        IN_VM_OPERATION.store(false, core::sync::atomic::Ordering::Release);
    }
}

/// What a failed fault maps to when it must be delivered to user mode as a
/// signal, per the documented NOT_PRESENT/PROTECTION -> SEGV_MAPERR/
/// SEGV_ACCERR/BUS_ADRERR table. This crate slice has no signal delivery
/// path (out of scope); callers needing to raise a signal translate this
/// error into their own signal type.
pub fn fault_to_signal_kind(err: KernelError) -> &'static str {
    match err {
        KernelError::InvalidAddr => "SEGV_MAPERR",
        KernelError::PermDenied => "SEGV_ACCERR",
        _ => "BUS_ADRERR",
    }
}

/// Handle a page fault against `space`.
pub fn handle(
    space: &AddressSpace,
    addr: u64,
    reason: FaultReason,
    access: Protection,
) -> Result<(), KernelError> {
    let _guard = RecursionScope::enter()?;

    let page_addr = addr & !(PAGE_SIZE - 1);

    let result = space.with_state(|regions, amaps| -> Result<(), KernelError> {
        let region = regions.find(page_addr).ok_or(KernelError::InvalidAddr)?;
        if region.state != RegionState::Allocated {
            return Err(KernelError::InvalidAddr);
        }
        if !region.prot.intersects(access) {
            return Err(KernelError::PermDenied);
        }
        if region.flags.contains(crate::memory::region::MapFlags::STACK)
            && page_addr == region.start
        {
            return Err(KernelError::InvalidAddr);
        }

        if reason == FaultReason::Protection {
            if !access.contains(Protection::WRITE) {
                return Err(KernelError::Fatal);
            }
            if !region.flags.contains(crate::memory::region::MapFlags::PRIVATE) {
                return Err(KernelError::Fatal);
            }
        }

        let region = region.clone();
        let mut mmu = space.mmu_lock();
        let page = Page::<Size4KiB>::containing_address(VirtAddr::new(page_addr));

        match region.amap.map(AmapId) {
            Some(amap_id) => {
                let amap = amaps.get(&amap_id).ok_or(KernelError::Fatal)?;
                let slot = ((region.amap_offset + (page_addr - region.start)) / PAGE_SIZE) as usize;
                let object_offset = region.object_offset + (page_addr - region.start);
                anon_fault(&mut mmu, page, region.prot, amap, slot, reason, access, region.object, object_offset)
            }
            None => {
                let _ = &mut mmu;
                Err(KernelError::NotSupported)
            }
        }
    });

    result
}

#[allow(clippy::too_many_arguments)]
fn anon_fault(
    mmu: &mut crate::memory::mmu_context::MmuContext,
    page: Page<Size4KiB>,
    region_prot: Protection,
    amap: &crate::memory::amap::Amap,
    slot: usize,
    reason: FaultReason,
    access: Protection,
    object: Option<ObjectHandle>,
    object_offset: u64,
) -> Result<(), KernelError> {
    let writable = region_prot.contains(Protection::WRITE);
    let is_write = access.contains(Protection::WRITE);
    let has_object = object.is_some();
    let existing = amap.get(slot);

    match existing {
        None if !has_object => {
            // Empty slot, no backing object: zero-fill.
            let frame = allocate_frame().ok_or(KernelError::NoMemory)?;
            zero_frame(frame);
            amap.install(slot, frame);
            let flags = pte_flags(region_prot, writable);
            mmu.map_page(page, frame, flags).map_err(|_| KernelError::Fatal)
        }
        None => {
            // Empty slot, backing object: fetch its content (covers
            // READ/EXEC/WRITE faults over a previously unpopulated slot).
            let handle = object.ok_or(KernelError::Fatal)?;
            let frame = Ext2FileObject.get_page(handle, object_offset)?;
            amap.install(slot, frame);
            let flags = pte_flags(region_prot, is_write && writable);
            mmu.map_page(page, frame, flags).map_err(|_| KernelError::Fatal)
        }
        Some(frame) if is_write && frame_metadata::frame_refcount(frame) == 1 => {
            // Sole owner: map writable in place.
            cow_stats::SOLE_OWNER_OPT.fetch_add(1, core::sync::atomic::Ordering::Relaxed);
            let flags = pte_flags(region_prot, true);
            if reason == FaultReason::Protection {
                let _ = mmu.unmap_page(page);
            }
            mmu.map_page(page, frame, flags).map_err(|_| KernelError::Fatal)
        }
        Some(frame) if is_write => {
            // Shared (refcount > 1): copy-on-write.
            cow_stats::TOTAL_FAULTS.fetch_add(1, core::sync::atomic::Ordering::Relaxed);
            cow_stats::PAGES_COPIED.fetch_add(1, core::sync::atomic::Ordering::Relaxed);

            let new_frame = allocate_frame().ok_or(KernelError::NoMemory)?;
            copy_frame(frame, new_frame);
            amap.clear(slot);
            if frame_metadata::frame_decref(frame) {
                deallocate_frame(frame);
            }
            amap.install(slot, new_frame);

            let flags = make_private_flags(pte_flags(region_prot, true));
            if reason == FaultReason::Protection {
                let _ = mmu.unmap_page(page);
            }
            mmu.map_page(page, new_frame, flags).map_err(|_| KernelError::Fatal)
        }
        Some(frame) => {
            // READ/EXEC with refcount > 1: install read-only, CoW-marked.
            let flags = make_cow_flags(pte_flags(region_prot, false));
            mmu.map_page(page, frame, flags).map_err(|_| KernelError::Fatal)
        }
    }
}

fn pte_flags(prot: Protection, writable: bool) -> PageTableFlags {
    let mut flags = PageTableFlags::PRESENT | PageTableFlags::USER_ACCESSIBLE;
    if writable && prot.contains(Protection::WRITE) {
        flags |= PageTableFlags::WRITABLE;
    }
    if !prot.contains(Protection::EXEC) {
        flags |= PageTableFlags::NO_EXECUTE;
    }
    flags
}

fn zero_frame(frame: PhysFrame) {
    let offset = crate::memory::physical_memory_offset();
    let virt = offset + frame.start_address().as_u64();
    unsafe {
        core::ptr::write_bytes(virt.as_mut_ptr::<u8>(), 0, PAGE_SIZE as usize);
    }
}

fn copy_frame(src: PhysFrame, dst: PhysFrame) {
    let offset = crate::memory::physical_memory_offset();
    let src_virt = offset + src.start_address().as_u64();
    let dst_virt = offset + dst.start_address().as_u64();
    unsafe {
        core::ptr::copy_nonoverlapping(
            src_virt.as_ptr::<u8>(),
            dst_virt.as_mut_ptr::<u8>(),
            PAGE_SIZE as usize,
        );
    }
}

