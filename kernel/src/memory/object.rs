//! Minimal object-backed page provider for the VMM fault path.
//!
//! Object-backed regions reference file content through an opaque
//! `ObjectHandle`; this module is the seam between the anonymous-fault
//! matrix and whatever owns that content. The only backing wired up in this
//! crate slice is the mounted Ext2 file map (`fs::ext2::file::read_file_range`):
//! `get_page` copies one page of file content into a fresh frame, zero-filling
//! any tail past EOF, and `release_page` is a no-op since this path never
//! writes back through the object.

use super::frame_allocator::allocate_frame;
use super::region::{ObjectHandle, PAGE_SIZE};
use crate::error::KernelError;
#[cfg(target_arch = "x86_64")]
use x86_64::structures::paging::{PhysFrame, Size4KiB};
#[cfg(not(target_arch = "x86_64"))]
use super::arch_stub::{PhysFrame, Size4KiB};

/// Source of page content for object-backed mappings.
pub trait ObjectProvider: Send + Sync {
    /// Populate a fresh frame with the object's content at `offset` bytes
    /// into the object and return it.
    fn get_page(&self, handle: ObjectHandle, offset: u64) -> Result<PhysFrame<Size4KiB>, KernelError>;

    /// Release a reference obtained via `get_page`. Default no-op: this
    /// crate slice has no writeback path for object-backed pages.
    fn release_page(&self, _handle: ObjectHandle, _offset: u64, _frame: PhysFrame<Size4KiB>) {}
}

/// Backs an `ObjectHandle` by an inode number in the mounted root Ext2
/// filesystem; `offset` is a byte offset into that inode's content.
pub struct Ext2FileObject;

impl ObjectProvider for Ext2FileObject {
    fn get_page(&self, handle: ObjectHandle, offset: u64) -> Result<PhysFrame<Size4KiB>, KernelError> {
        let mut guard = crate::fs::ext2::root_fs();
        let fs = guard.as_mut().ok_or(KernelError::NotFound)?;
        let inode = fs.read_inode(handle.0 as u32).map_err(|_| KernelError::NotFound)?;
        let data = fs
            .read_file_range(&inode, offset, PAGE_SIZE as usize)
            .map_err(|_| KernelError::DeviceError)?;

        let frame = allocate_frame().ok_or(KernelError::NoMemory)?;
        let phys_offset = crate::memory::physical_memory_offset();
        let virt = phys_offset + frame.start_address().as_u64();
        unsafe {
            core::ptr::write_bytes(virt.as_mut_ptr::<u8>(), 0, PAGE_SIZE as usize);
            let len = data.len().min(PAGE_SIZE as usize);
            core::ptr::copy_nonoverlapping(data.as_ptr(), virt.as_mut_ptr::<u8>(), len);
        }
        Ok(frame)
    }
}
