//! Translation Lookaside Buffer (TLB) management
//!
//! This module provides safe wrappers around x86_64 TLB flush operations.
//! The TLB caches virtual-to-physical address translations, and must be
//! flushed when page table entries are modified to ensure the CPU sees
//! the updated mappings.

#[cfg(target_arch = "x86_64")]
use x86_64::{instructions::tlb, structures::paging::Page, VirtAddr};
#[cfg(not(target_arch = "x86_64"))]
use crate::memory::arch_stub::{Page, VirtAddr};

/// Flush a single page from the TLB. Must be called after any mapping
/// change a `Mapper::map_to`/`unmap` flush did not already cover (the common
/// case is already handled by the `MapperFlush`/`UnmapReturn` returned from
/// those calls; this exists for the address-space unmap and COW paths that
/// batch several page-table edits before flushing once).
pub fn flush_page(addr: VirtAddr) {
    #[cfg(target_arch = "x86_64")]
    {
        let page = Page::<x86_64::structures::paging::Size4KiB>::containing_address(addr);
        tlb::flush(page.start_address());
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        let _ = addr;
    }
}

/// Flush the entire TLB by reloading CR3. Used after `address_space::switch`
/// rather than per-page invalidation, and after `destroy()` tears down a
/// whole address space.
pub fn flush_all() {
    #[cfg(target_arch = "x86_64")]
    {
        tlb::flush_all();
    }
}
