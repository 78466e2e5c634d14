//! ext2 file content reading
//!
//! Handles reading file data by following the block pointer structure
//! in the inode (direct, single/double/triple indirect blocks).

use crate::block::{BlockDevice, BlockError};
use crate::fs::ext2::block_group::allocate_block;
use crate::fs::ext2::extent::{self, EXT4_EXTENTS_FL};
use crate::fs::ext2::{Ext2BlockGroupDesc, Ext2Inode, Ext2Superblock};
use alloc::vec;
use alloc::vec::Vec;

/// Number of direct block pointers in the inode
const DIRECT_BLOCKS: u32 = 12;

/// Index of single indirect block pointer
const SINGLE_INDIRECT: usize = 12;

/// Index of double indirect block pointer
const DOUBLE_INDIRECT: usize = 13;

/// Index of triple indirect block pointer
const TRIPLE_INDIRECT: usize = 14;

/// Read a specific data block number for a file
///
/// Given a logical block index (0 = first block of file, 1 = second, etc.),
/// returns the physical block number on disk.
///
/// # Arguments
/// * `device` - The block device to read from
/// * `inode` - The inode containing block pointers
/// * `superblock` - The superblock (for block size calculation)
/// * `logical_block` - Logical block index within the file (0-based)
///
/// # Returns
/// * `Ok(Some(block_num))` - Physical block number on disk
/// * `Ok(None)` - Sparse hole (block pointer is 0)
/// * `Err(BlockError)` - I/O error or out of bounds
pub fn get_block_num<B: BlockDevice>(
    device: &B,
    inode: &Ext2Inode,
    superblock: &Ext2Superblock,
    logical_block: u32,
) -> Result<Option<u32>, BlockError> {
    let block_size = superblock.block_size();

    let i_flags = unsafe { core::ptr::read_unaligned(core::ptr::addr_of!(inode.i_flags)) };
    if i_flags & EXT4_EXTENTS_FL != 0 {
        return extent::get_block_num(device, inode, block_size, logical_block)
            .map_err(|_| BlockError::IoError);
    }

    let ptrs_per_block = (block_size / 4) as u32; // 4 bytes per u32 block pointer

    // Read block pointers safely from packed struct
    let i_block = unsafe {
        core::ptr::read_unaligned(core::ptr::addr_of!(inode.i_block))
    };

    // Direct blocks (0-11)
    if logical_block < DIRECT_BLOCKS {
        let block_num = i_block[logical_block as usize];
        return Ok(if block_num == 0 { None } else { Some(block_num) });
    }

    let direct_count = DIRECT_BLOCKS;
    let single_indirect_count = ptrs_per_block;
    let double_indirect_count = ptrs_per_block * ptrs_per_block;

    // Single indirect block (12)
    if logical_block < direct_count + single_indirect_count {
        let single_indirect_ptr = i_block[SINGLE_INDIRECT];
        if single_indirect_ptr == 0 {
            return Ok(None); // Sparse hole
        }

        let index_in_indirect = logical_block - direct_count;
        let indirect_blocks = read_indirect_block(device, single_indirect_ptr, block_size)?;
        let block_num = indirect_blocks[index_in_indirect as usize];
        return Ok(if block_num == 0 { None } else { Some(block_num) });
    }

    // Double indirect block (13)
    if logical_block < direct_count + single_indirect_count + double_indirect_count {
        let double_indirect_ptr = i_block[DOUBLE_INDIRECT];
        if double_indirect_ptr == 0 {
            return Ok(None); // Sparse hole
        }

        let index_in_double = logical_block - direct_count - single_indirect_count;
        let first_level_index = index_in_double / ptrs_per_block;
        let second_level_index = index_in_double % ptrs_per_block;

        // Read first-level indirect block (contains pointers to second-level blocks)
        let first_level_blocks = read_indirect_block(device, double_indirect_ptr, block_size)?;
        let second_level_ptr = first_level_blocks[first_level_index as usize];
        if second_level_ptr == 0 {
            return Ok(None); // Sparse hole
        }

        // Read second-level indirect block (contains pointers to data blocks)
        let second_level_blocks = read_indirect_block(device, second_level_ptr, block_size)?;
        let block_num = second_level_blocks[second_level_index as usize];
        return Ok(if block_num == 0 { None } else { Some(block_num) });
    }

    // Triple indirect block (14): not supported, matches set_block_num's write-side rejection
    Err(BlockError::NotSupported)
}

/// Read the entire contents of a file
///
/// # Arguments
/// * `device` - The block device to read from
/// * `inode` - The inode containing block pointers and file size
/// * `superblock` - The superblock (for block size calculation)
///
/// # Returns
/// * `Ok(Vec<u8>)` - File contents
/// * `Err(BlockError)` - I/O error
pub fn read_file<B: BlockDevice>(
    device: &B,
    inode: &Ext2Inode,
    superblock: &Ext2Superblock,
) -> Result<Vec<u8>, BlockError> {
    let file_size = inode.size() as usize;
    if file_size == 0 {
        return Ok(Vec::new());
    }

    read_file_range(device, inode, superblock, 0, file_size)
}

/// Read a portion of a file (for seek + read operations)
///
/// # Arguments
/// * `device` - The block device to read from
/// * `inode` - The inode containing block pointers
/// * `superblock` - The superblock (for block size calculation)
/// * `offset` - Starting byte offset within the file
/// * `length` - Number of bytes to read
///
/// # Returns
/// * `Ok(Vec<u8>)` - File contents (may be shorter than length if EOF reached)
/// * `Err(BlockError)` - I/O error
pub fn read_file_range<B: BlockDevice>(
    device: &B,
    inode: &Ext2Inode,
    superblock: &Ext2Superblock,
    offset: u64,
    length: usize,
) -> Result<Vec<u8>, BlockError> {
    let file_size = inode.size();
    if offset >= file_size {
        return Ok(Vec::new()); // Read past EOF
    }

    // Clamp length to not read past EOF
    let actual_length = core::cmp::min(length, (file_size - offset) as usize);
    if actual_length == 0 {
        return Ok(Vec::new());
    }

    let block_size = superblock.block_size();
    let start_block = (offset / block_size as u64) as u32;
    let offset_in_first_block = (offset % block_size as u64) as usize;
    let end_offset = offset + actual_length as u64;
    let end_block = ((end_offset + block_size as u64 - 1) / block_size as u64) as u32;

    let mut result = Vec::with_capacity(actual_length);
    let mut block_buf = vec![0u8; block_size];

    for logical_block in start_block..end_block {
        // Get physical block number (or None for sparse holes)
        let physical_block = get_block_num(device, inode, superblock, logical_block)?;

        // Read block or fill with zeros for sparse holes
        if let Some(block_num) = physical_block {
            device.read_block(block_num as u64, &mut block_buf)?;
        } else {
            // Sparse hole - fill with zeros
            block_buf.fill(0);
        }

        // Calculate which bytes from this block to copy
        let block_offset = logical_block as u64 * block_size as u64;
        let start_in_block = if block_offset < offset {
            offset_in_first_block
        } else {
            0
        };
        let end_in_block = if block_offset + block_size as u64 > end_offset {
            (end_offset - block_offset) as usize
        } else {
            block_size
        };

        result.extend_from_slice(&block_buf[start_in_block..end_in_block]);
    }

    Ok(result)
}

/// Helper to read block pointers from an indirect block
///
/// Reads a block containing an array of u32 block pointers (little-endian).
///
/// # Arguments
/// * `device` - The block device to read from
/// * `block_num` - Physical block number of the indirect block
/// * `block_size` - Filesystem block size
///
/// # Returns
/// * `Ok(Vec<u32>)` - Array of block pointers
/// * `Err(BlockError)` - I/O error
fn read_indirect_block<B: BlockDevice>(
    device: &B,
    block_num: u32,
    block_size: usize,
) -> Result<Vec<u32>, BlockError> {
    let mut block_buf = vec![0u8; block_size];
    device.read_block(block_num as u64, &mut block_buf)?;

    // Parse as array of little-endian u32 pointers
    let num_pointers = block_size / 4;
    let mut pointers = Vec::with_capacity(num_pointers);

    for i in 0..num_pointers {
        let offset = i * 4;
        let ptr = u32::from_le_bytes([
            block_buf[offset],
            block_buf[offset + 1],
            block_buf[offset + 2],
            block_buf[offset + 3],
        ]);
        pointers.push(ptr);
    }

    Ok(pointers)
}

/// Find or allocate the physical block backing logical block `logical_block`
/// of a classic (non-extent) inode, growing the direct/single-indirect/
/// double-indirect tree as needed. Returns `Err` for anything requiring the
/// triple-indirect pointer, matching the on-disk driver's decision not to
/// support triple-indirect writes.
fn set_block_num<B: BlockDevice>(
    device: &B,
    inode: &mut Ext2Inode,
    superblock: &Ext2Superblock,
    block_groups: &mut [Ext2BlockGroupDesc],
    logical_block: u32,
) -> Result<u32, &'static str> {
    let block_size = superblock.block_size();
    let ptrs_per_block = (block_size / 4) as u32;

    let i_block = unsafe { core::ptr::read_unaligned(core::ptr::addr_of!(inode.i_block)) };

    if logical_block < DIRECT_BLOCKS {
        let idx = logical_block as usize;
        if i_block[idx] != 0 {
            return Ok(i_block[idx]);
        }
        let new_block = allocate_block(device, superblock, block_groups)?;
        unsafe {
            let ptr = core::ptr::addr_of_mut!(inode.i_block);
            (*ptr)[idx] = new_block;
        }
        grow_inode_blocks(inode, block_size);
        return Ok(new_block);
    }

    let direct_count = DIRECT_BLOCKS;
    let single_indirect_count = ptrs_per_block;

    if logical_block < direct_count + single_indirect_count {
        let mut indirect_ptr = i_block[SINGLE_INDIRECT];
        if indirect_ptr == 0 {
            indirect_ptr = allocate_block(device, superblock, block_groups)?;
            unsafe {
                (*core::ptr::addr_of_mut!(inode.i_block))[SINGLE_INDIRECT] = indirect_ptr;
            }
            grow_inode_blocks(inode, block_size);
        }
        let index = (logical_block - direct_count) as usize;
        return alloc_in_indirect(device, superblock, block_groups, inode, indirect_ptr, index, block_size);
    }

    let double_indirect_count = ptrs_per_block * ptrs_per_block;
    if logical_block < direct_count + single_indirect_count + double_indirect_count {
        let mut dbl_ptr = i_block[DOUBLE_INDIRECT];
        if dbl_ptr == 0 {
            dbl_ptr = allocate_block(device, superblock, block_groups)?;
            unsafe {
                (*core::ptr::addr_of_mut!(inode.i_block))[DOUBLE_INDIRECT] = dbl_ptr;
            }
            grow_inode_blocks(inode, block_size);
        }

        let index_in_double = logical_block - direct_count - single_indirect_count;
        let first_level_index = (index_in_double / ptrs_per_block) as usize;
        let second_level_index = (index_in_double % ptrs_per_block) as usize;

        let mut first_level = read_indirect_block(device, dbl_ptr, block_size).map_err(|_| "I/O error")?;
        let mut single_ptr = first_level[first_level_index];
        if single_ptr == 0 {
            single_ptr = allocate_block(device, superblock, block_groups)?;
            first_level[first_level_index] = single_ptr;
            write_indirect_block(device, dbl_ptr, &first_level, block_size)?;
            grow_inode_blocks(inode, block_size);
        }

        return alloc_in_indirect(device, superblock, block_groups, inode, single_ptr, second_level_index, block_size);
    }

    Err("triple-indirect writes are not supported")
}

fn alloc_in_indirect<B: BlockDevice>(
    device: &B,
    superblock: &Ext2Superblock,
    block_groups: &mut [Ext2BlockGroupDesc],
    inode: &mut Ext2Inode,
    indirect_block: u32,
    index: usize,
    block_size: usize,
) -> Result<u32, &'static str> {
    let mut pointers = read_indirect_block(device, indirect_block, block_size).map_err(|_| "I/O error")?;
    if pointers[index] != 0 {
        return Ok(pointers[index]);
    }
    let new_block = allocate_block(device, superblock, block_groups)?;
    pointers[index] = new_block;
    write_indirect_block(device, indirect_block, &pointers, block_size)?;
    grow_inode_blocks(inode, block_size);
    Ok(new_block)
}

fn write_indirect_block<B: BlockDevice>(
    device: &B,
    block_num: u32,
    pointers: &[u32],
    block_size: usize,
) -> Result<(), &'static str> {
    let mut buf = vec![0u8; block_size];
    for (i, ptr) in pointers.iter().enumerate() {
        buf[i * 4..i * 4 + 4].copy_from_slice(&ptr.to_le_bytes());
    }
    device.write_block(block_num as u64, &buf).map_err(|_| "I/O error writing indirect block")
}

/// `i_blocks` is tracked in 512-byte sectors, not filesystem blocks.
fn grow_inode_blocks(inode: &mut Ext2Inode, block_size: usize) {
    let sectors = (block_size / 512) as u32;
    let current = unsafe { core::ptr::read_unaligned(core::ptr::addr_of!(inode.i_blocks)) };
    inode.i_blocks = current + sectors;
}

/// Write `data` into a file starting at byte `offset`, allocating blocks on
/// demand. Grows `i_size` when the write extends past the current end of
/// file; never leaves a sparse hole behind the new write (intervening
/// blocks are allocated and zero-filled like the read path already assumes).
///
/// Returns the number of bytes written, or `Err` if a write would require
/// the (unsupported) triple-indirect pointer.
pub fn write_file_range<B: BlockDevice>(
    device: &B,
    inode: &mut Ext2Inode,
    superblock: &Ext2Superblock,
    block_groups: &mut [Ext2BlockGroupDesc],
    offset: u64,
    data: &[u8],
) -> Result<usize, &'static str> {
    if data.is_empty() {
        return Ok(0);
    }

    let i_flags = unsafe { core::ptr::read_unaligned(core::ptr::addr_of!(inode.i_flags)) };
    if i_flags & EXT4_EXTENTS_FL != 0 {
        return Err("writing extent-mapped inodes is not supported");
    }

    let block_size = superblock.block_size();
    let start_block = (offset / block_size as u64) as u32;
    let end_offset = offset + data.len() as u64;
    let end_block = ((end_offset + block_size as u64 - 1) / block_size as u64) as u32;

    let mut written = 0usize;
    let mut block_buf = vec![0u8; block_size];

    for logical_block in start_block..end_block {
        let block_offset = logical_block as u64 * block_size as u64;
        let start_in_block = if block_offset < offset {
            (offset - block_offset) as usize
        } else {
            0
        };
        let end_in_block = if block_offset + block_size as u64 > end_offset {
            (end_offset - block_offset) as usize
        } else {
            block_size
        };

        let physical_block = set_block_num(device, inode, superblock, block_groups, logical_block)?;

        // Partial-block writes need the existing content around the write
        // window so unwritten bytes in the block aren't clobbered.
        if start_in_block != 0 || end_in_block != block_size {
            device.read_block(physical_block as u64, &mut block_buf).map_err(|_| "I/O error")?;
        }

        let src_start = written;
        let src_len = end_in_block - start_in_block;
        block_buf[start_in_block..end_in_block].copy_from_slice(&data[src_start..src_start + src_len]);
        device.write_block(physical_block as u64, &block_buf).map_err(|_| "I/O error")?;

        written += src_len;
    }

    if end_offset > inode.size() {
        inode.set_size(end_offset);
    }
    inode.update_timestamps(false, true, true);

    Ok(written)
}
