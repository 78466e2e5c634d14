//! Canonical user/kernel address space layout constants.
//!
//! These are the fixed boundaries every `AddressSpace` region arena validates
//! against: user code/data, the mmap/anon region VMM allocations are carved
//! out of, and the user stack region. Kernel space starts at `KERNEL_BASE`
//! and is never represented by a `Region` — it is mapped eagerly (MLOCK,
//! see `memory::paging`) rather than demand-paged.

#[cfg(target_arch = "x86_64")]
use x86_64::VirtAddr;
#[cfg(not(target_arch = "x86_64"))]
use crate::memory::arch_stub::VirtAddr;

/// Upper-half kernel base; addresses at or above this are never user-mapped.
pub const KERNEL_BASE: u64 = 0xffffffff80000000;

/// Higher-half direct physical memory map base.
#[allow(dead_code)]
pub const HHDM_BASE: u64 = 0xffff800000000000;

/// MMIO virtual address region, used by `memory::map_mmio`.
pub const MMIO_BASE: u64 = 0xffffe00000000000;

/// Base of user space. Chosen at the 1GiB mark so it falls in PDPT[1],
/// leaving PDPT[0] entirely to the kernel.
pub const USERSPACE_BASE: u64 = 0x4000_0000;

/// End of the user code/data region (2GiB). Object-backed and anonymous
/// `EXACT` mappings below this line are where a loaded image's segments go.
pub const USERSPACE_CODE_DATA_END: u64 = 0x8000_0000;

/// Start of the general-purpose anonymous mmap region. `ANY`-placed regions
/// are carved out of `[MMAP_REGION_START, MMAP_REGION_END)` by the region
/// arena's freelists.
pub const MMAP_REGION_START: u64 = 0x7000_0000_0000;

/// End of the anonymous mmap region (leaves a gap below the stack region).
pub const MMAP_REGION_END: u64 = 0x7FFF_FE00_0000;

/// Start of the user stack region (high canonical space).
pub const USER_STACK_REGION_START: u64 = 0x7FFF_FF00_0000;

/// End of the user stack region (top of lower-half canonical space).
pub const USER_STACK_REGION_END: u64 = 0x8000_0000_0000;

/// Default user stack size.
pub const USER_STACK_SIZE: usize = 64 * 1024;

pub fn log_layout() {
    log::info!(
        "LAYOUT: user code/data {:#x}..{:#x}, mmap {:#x}..{:#x}, stack {:#x}..{:#x}",
        USERSPACE_BASE,
        USERSPACE_CODE_DATA_END,
        MMAP_REGION_START,
        MMAP_REGION_END,
        USER_STACK_REGION_START,
        USER_STACK_REGION_END
    );
}

#[inline]
pub fn is_user_code_data_address(addr: u64) -> bool {
    addr >= USERSPACE_BASE && addr < USERSPACE_CODE_DATA_END
}

#[inline]
pub fn is_user_stack_address(addr: u64) -> bool {
    addr >= USER_STACK_REGION_START && addr < USER_STACK_REGION_END
}

#[inline]
pub fn is_user_mmap_address(addr: u64) -> bool {
    addr >= MMAP_REGION_START && addr < MMAP_REGION_END
}

/// Any address a `Region` is allowed to cover. Does not check that the page
/// is actually mapped — an address in a valid region but with no backing
/// region entry still takes a page fault, which is correct.
#[inline]
pub fn is_valid_user_address(addr: u64) -> bool {
    is_user_code_data_address(addr) || is_user_mmap_address(addr) || is_user_stack_address(addr)
}

#[inline]
pub fn is_kernel_address(addr: VirtAddr) -> bool {
    addr.as_u64() >= KERNEL_BASE
}

const _: () = assert!(
    USERSPACE_CODE_DATA_END <= MMAP_REGION_START,
    "user code/data region overlaps with mmap region"
);

const _: () = assert!(
    MMAP_REGION_END <= USER_STACK_REGION_START,
    "mmap region overlaps with stack region"
);
