//! Platform-wide constants shared by the VMM, Ext2, and IPC subsystems.
//!
//! Grouped here rather than left scattered per-module, the way
//! `memory::layout` already groups the address-space layout constants.

/// Size of one physical page / one VMM region granule.
pub const PAGE_SIZE: usize = 4096;

/// Base and size of the portion of the address space available to
/// `address_space::AddressSpace` region allocation. Mirrors
/// `memory::layout::USERSPACE_BASE`/`MMAP_REGION_END` but expressed as a
/// single contiguous arena the region freelists carve up.
pub const USER_BASE: u64 = crate::memory::layout::USERSPACE_BASE;
pub const USER_SIZE: u64 = crate::memory::layout::USER_STACK_REGION_END - crate::memory::layout::USERSPACE_BASE;

/// Maximum number of bytes a pipe buffers before a writer blocks.
pub const PIPE_SIZE: usize = 64 * 1024;

/// Maximum number of in-flight messages an IPC port's queue holds before
/// `send` blocks or returns `WouldBlock` on a non-blocking handle.
pub const IPC_QUEUE_MAX: usize = 256;

/// Maximum payload size, in bytes, of a single IPC message.
pub const IPC_MESSAGE_MAX: usize = 64 * 1024;
