//! Per-address-space MMU backend.
//!
//! An `MmuContext` owns one process's top-level page table and the mapper
//! built on top of it. `AddressSpace` (see `memory::address_space`) is the
//! architecture-independent half of a process's memory; this module is the
//! half that actually walks page tables, and is the only place in the VMM
//! that holds a `#[cfg(target_arch = "x86_64")]` / `arch_stub` split.

use crate::memory::frame_allocator::{allocate_frame, GlobalFrameAllocator};
#[cfg(target_arch = "x86_64")]
use x86_64::{
    registers::control::Cr3,
    structures::paging::{
        Mapper, OffsetPageTable, Page, PageTable, PageTableFlags, PhysFrame, Size4KiB, Translate,
    },
    PhysAddr, VirtAddr,
};
#[cfg(not(target_arch = "x86_64"))]
use crate::memory::arch_stub::{
    Cr3, Mapper, OffsetPageTable, Page, PageTable, PageTableFlags, PhysAddr, PhysFrame, Size4KiB,
    Translate, VirtAddr,
};

/// Copy-on-write flag, stored in an OS-available PTE bit (bit 9 on x86_64).
///
/// Set: the page is read-only because it is CoW-shared and was originally
/// writable. Clear: the page is genuinely read-only, or writable as intended.
/// The anonymous fault matrix (`memory::fault`) uses this bit to distinguish
/// a CoW write fault from a real protection violation.
pub const COW_FLAG: PageTableFlags = PageTableFlags::BIT_9;

#[inline]
pub fn is_cow_page(flags: PageTableFlags) -> bool {
    flags.contains(COW_FLAG)
}

#[inline]
pub fn make_cow_flags(original_flags: PageTableFlags) -> PageTableFlags {
    let mut flags = original_flags;
    flags.remove(PageTableFlags::WRITABLE);
    flags.insert(COW_FLAG);
    flags
}

#[inline]
pub fn make_private_flags(original_flags: PageTableFlags) -> PageTableFlags {
    let mut flags = original_flags;
    flags.insert(PageTableFlags::WRITABLE);
    flags.remove(COW_FLAG);
    flags
}

/// One process's top-level page table plus the mapper built on it.
///
/// Kernel upper-half entries are copied in at creation time so kernel code
/// keeps running immediately after a CR3 switch into this context; user
/// entries start out empty and are populated page-by-page by
/// `address_space::AddressSpace::map`/page-fault servicing.
pub struct MmuContext {
    level_4_frame: PhysFrame,
    mapper: OffsetPageTable<'static>,
}

impl MmuContext {
    /// Allocate a fresh top-level table, sharing the kernel's upper half
    /// with whatever page table is active right now.
    pub fn new() -> Result<Self, &'static str> {
        let level_4_frame = allocate_frame().ok_or("out of memory allocating L4 table")?;
        let phys_offset = crate::memory::physical_memory_offset();

        let level_4_table = unsafe {
            let virt = phys_offset + level_4_frame.start_address().as_u64();
            &mut *(virt.as_mut_ptr() as *mut PageTable)
        };
        for i in 0..512 {
            level_4_table[i].set_unused();
        }

        unsafe {
            let (current_frame, _) = Cr3::read();
            let current_virt = phys_offset + current_frame.start_address().as_u64();
            let current_l4 = &*(current_virt.as_ptr() as *const PageTable);

            // Kernel lives above KERNEL_BASE; share those entries verbatim so
            // the kernel stays mapped after we switch into this context.
            for i in 256..512 {
                if !current_l4[i].is_unused() {
                    let addr = current_l4[i].addr();
                    let flags = current_l4[i].flags();
                    if flags.contains(PageTableFlags::PRESENT) && addr.as_u64() == 0 {
                        continue;
                    }
                    level_4_table[i].set_addr(addr, flags);
                }
            }
        }

        let mapper = unsafe {
            let virt = phys_offset + level_4_frame.start_address().as_u64();
            let table_ptr = &mut *(virt.as_mut_ptr() as *mut PageTable);
            OffsetPageTable::new(table_ptr, phys_offset)
        };

        Ok(Self {
            level_4_frame,
            mapper,
        })
    }

    pub fn level_4_frame(&self) -> PhysFrame {
        self.level_4_frame
    }

    /// Load this context's page table into CR3. Caller is responsible for
    /// the address-space-mutex/MMU-context-lock ordering (`kernel::sync`).
    pub fn switch_to(&self) {
        #[cfg(target_arch = "x86_64")]
        unsafe {
            use x86_64::registers::control::{Cr3, Cr3Flags};
            Cr3::write(self.level_4_frame, Cr3Flags::empty());
        }
        crate::memory::tlb::flush_all();
    }

    pub fn map_page(
        &mut self,
        page: Page<Size4KiB>,
        frame: PhysFrame<Size4KiB>,
        flags: PageTableFlags,
    ) -> Result<(), &'static str> {
        if let Ok(existing) = self.mapper.translate_page(page) {
            if existing == frame {
                return Ok(());
            }
            return Err("page already mapped to a different frame");
        }

        let table_flags = if flags.contains(PageTableFlags::USER_ACCESSIBLE) {
            PageTableFlags::PRESENT | PageTableFlags::WRITABLE | PageTableFlags::USER_ACCESSIBLE
        } else {
            PageTableFlags::PRESENT | PageTableFlags::WRITABLE
        };

        unsafe {
            self.mapper
                .map_to_with_table_flags(page, frame, flags, table_flags, &mut GlobalFrameAllocator)
                .map_err(|_| "failed to map page")?
                .ignore();
        }
        Ok(())
    }

    pub fn unmap_page(&mut self, page: Page<Size4KiB>) -> Result<PhysFrame<Size4KiB>, &'static str> {
        let (frame, flush) = self.mapper.unmap(page).map_err(|_| "page not mapped")?;
        flush.ignore();
        Ok(frame)
    }

    /// Replace the flags of an already-mapped page, e.g. after a CoW copy
    /// or an `mprotect`-equivalent region-permission change.
    pub fn update_page_flags(
        &mut self,
        page: Page<Size4KiB>,
        new_flags: PageTableFlags,
    ) -> Result<(), &'static str> {
        let frame = self.mapper.translate_page(page).map_err(|_| "page not mapped")?;
        let (unmapped, _) = self.mapper.unmap(page).map_err(|_| "failed to unmap for flag update")?;
        if unmapped != frame {
            return Err("frame mismatch during flag update");
        }

        let table_flags = if new_flags.contains(PageTableFlags::USER_ACCESSIBLE) {
            PageTableFlags::PRESENT | PageTableFlags::WRITABLE | PageTableFlags::USER_ACCESSIBLE
        } else {
            PageTableFlags::PRESENT | PageTableFlags::WRITABLE
        };

        unsafe {
            self.mapper
                .map_to_with_table_flags(page, frame, new_flags, table_flags, &mut GlobalFrameAllocator)
                .map_err(|_| "failed to remap page with new flags")?
                .ignore();
        }
        Ok(())
    }

    /// Walk the table hierarchy by hand to recover both the frame and the
    /// raw PTE flags for a 4KiB page — `Mapper::translate_page` only hands
    /// back the frame, and the fault handler needs the flags to tell a CoW
    /// write fault from a real protection violation.
    pub fn get_page_info(&self, page: Page<Size4KiB>) -> Option<(PhysFrame<Size4KiB>, PageTableFlags)> {
        let phys_offset = crate::memory::physical_memory_offset();
        let virt = page.start_address().as_u64();

        unsafe {
            let l4 = &*((phys_offset.as_u64() + self.level_4_frame.start_address().as_u64()) as *const PageTable);
            let l4e = &l4[((virt >> 39) & 0x1FF) as usize];
            if l4e.is_unused() || !l4e.flags().contains(PageTableFlags::PRESENT) {
                return None;
            }

            let l3 = &*((phys_offset.as_u64() + l4e.addr().as_u64()) as *const PageTable);
            let l3e = &l3[((virt >> 30) & 0x1FF) as usize];
            if l3e.is_unused() || !l3e.flags().contains(PageTableFlags::PRESENT) || l3e.flags().contains(PageTableFlags::HUGE_PAGE) {
                return None;
            }

            let l2 = &*((phys_offset.as_u64() + l3e.addr().as_u64()) as *const PageTable);
            let l2e = &l2[((virt >> 21) & 0x1FF) as usize];
            if l2e.is_unused() || !l2e.flags().contains(PageTableFlags::PRESENT) || l2e.flags().contains(PageTableFlags::HUGE_PAGE) {
                return None;
            }

            let l1 = &*((phys_offset.as_u64() + l2e.addr().as_u64()) as *const PageTable);
            let l1e = &l1[((virt >> 12) & 0x1FF) as usize];
            if l1e.is_unused() || !l1e.flags().contains(PageTableFlags::PRESENT) {
                return None;
            }

            Some((PhysFrame::containing_address(l1e.addr()), l1e.flags()))
        }
    }

    pub fn translate(&self, addr: VirtAddr) -> Option<PhysAddr> {
        self.mapper.translate_addr(addr)
    }
}
