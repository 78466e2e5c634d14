//! ext2 superblock structures and parsing
//!
//! The superblock contains critical filesystem metadata and is always located
//! at byte offset 1024 from the start of the device.

use crate::block::{BlockDevice, BlockError};
use core::mem;

/// ext2 magic number - identifies an ext2 filesystem
const EXT2_SUPER_MAGIC: u16 = 0xEF53;

/// Superblock offset from start of device (always 1024 bytes)
const SUPERBLOCK_OFFSET: usize = 1024;

/// ext2 superblock - always at byte offset 1024 from start of device
///
/// The superblock contains all the information about the filesystem layout,
/// including block size, number of inodes, block groups, and feature flags.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy)]
pub struct Ext2Superblock {
    pub s_inodes_count: u32,         // Total inodes
    pub s_blocks_count: u32,         // Total blocks
    pub s_r_blocks_count: u32,       // Reserved blocks
    pub s_free_blocks_count: u32,    // Free blocks
    pub s_free_inodes_count: u32,    // Free inodes
    pub s_first_data_block: u32,     // First data block (0 for 1024+ block sizes, 1 for 1024)
    pub s_log_block_size: u32,       // Block size = 1024 << s_log_block_size
    pub s_log_frag_size: u32,        // Fragment size
    pub s_blocks_per_group: u32,     // Blocks per group
    pub s_frags_per_group: u32,      // Fragments per group
    pub s_inodes_per_group: u32,     // Inodes per group
    pub s_mtime: u32,                // Mount time
    pub s_wtime: u32,                // Write time
    pub s_mnt_count: u16,            // Mount count
    pub s_max_mnt_count: u16,        // Max mount count
    pub s_magic: u16,                // Magic number (0xEF53)
    pub s_state: u16,                // State (clean/errors)
    pub s_errors: u16,               // Error handling
    pub s_minor_rev_level: u16,      // Minor revision
    pub s_lastcheck: u32,            // Last check time
    pub s_checkinterval: u32,        // Check interval
    pub s_creator_os: u32,           // Creator OS
    pub s_rev_level: u32,            // Revision level
    pub s_def_resuid: u16,           // Default UID for reserved blocks
    pub s_def_resgid: u16,           // Default GID for reserved blocks
    // Extended superblock fields (rev 1+)
    pub s_first_ino: u32,            // First non-reserved inode
    pub s_inode_size: u16,           // Inode size
    pub s_block_group_nr: u16,       // Block group number of this superblock
    pub s_feature_compat: u32,       // Compatible features
    pub s_feature_incompat: u32,     // Incompatible features
    pub s_feature_ro_compat: u32,    // Read-only compatible features
    pub s_uuid: [u8; 16],            // UUID
    pub s_volume_name: [u8; 16],     // Volume name
    // Padding to 1024 bytes total
    _reserved: [u8; 788],
}

impl Ext2Superblock {
    /// Read superblock from block device (always at offset 1024)
    ///
    /// # Arguments
    /// * `device` - The block device to read from
    ///
    /// # Returns
    /// * `Ok(Ext2Superblock)` - Successfully read and parsed superblock
    /// * `Err(BlockError)` - I/O error or invalid superblock
    pub fn read_from<B: BlockDevice>(device: &B) -> Result<Self, BlockError> {
        // The superblock is always at byte offset 1024, which may span multiple
        // device blocks depending on the device's native block size
        let device_block_size = device.block_size();
        
        // Calculate which device blocks we need to read
        let start_block = SUPERBLOCK_OFFSET / device_block_size;
        let offset_in_block = SUPERBLOCK_OFFSET % device_block_size;
        
        // We need to read enough blocks to get 1024 bytes of superblock data
        let superblock_size = mem::size_of::<Ext2Superblock>();
        let bytes_needed = offset_in_block + superblock_size;
        let blocks_needed = (bytes_needed + device_block_size - 1) / device_block_size;
        
        // Read the necessary blocks into a buffer
        let mut buffer = [0u8; 4096]; // Large enough for typical cases
        for i in 0..blocks_needed {
            device.read_block(
                (start_block + i) as u64,
                &mut buffer[i * device_block_size..(i + 1) * device_block_size],
            )?;
        }
        
        // Extract superblock from the buffer
        let sb_bytes = &buffer[offset_in_block..offset_in_block + superblock_size];
        
        // SAFETY: We're reading from a properly aligned buffer into a packed struct
        // The buffer is guaranteed to be large enough by the calculation above
        let superblock: Ext2Superblock = unsafe {
            core::ptr::read_unaligned(sb_bytes.as_ptr() as *const Ext2Superblock)
        };
        
        // Validate the magic number
        if !superblock.is_valid() {
            return Err(BlockError::IoError);
        }
        
        Ok(superblock)
    }
    
    /// Validate magic number
    ///
    /// # Returns
    /// * `true` - Valid ext2 filesystem (magic = 0xEF53)
    /// * `false` - Invalid or corrupted filesystem
    pub fn is_valid(&self) -> bool {
        let magic = self.s_magic;
        magic == EXT2_SUPER_MAGIC
    }
    
    /// Calculate block size in bytes
    ///
    /// ext2 block size is computed as: 1024 << s_log_block_size
    /// Valid values: 1024, 2048, 4096 (s_log_block_size = 0, 1, 2)
    ///
    /// # Returns
    /// Block size in bytes
    pub fn block_size(&self) -> usize {
        1024 << self.s_log_block_size
    }
    
    /// Calculate number of block groups
    ///
    /// The number of block groups is determined by dividing the total number
    /// of blocks by the blocks per group (rounding up).
    ///
    /// # Returns
    /// Number of block groups in the filesystem
    pub fn block_group_count(&self) -> u32 {
        (self.s_blocks_count + self.s_blocks_per_group - 1) / self.s_blocks_per_group
    }
    
    /// Calculate inode size (128 for rev 0, s_inode_size for rev 1+)
    ///
    /// # Returns
    /// Inode size in bytes
    pub fn inode_size(&self) -> usize {
        let rev_level = self.s_rev_level;
        if rev_level == 0 {
            128 // Default for original ext2
        } else {
            self.s_inode_size as usize
        }
    }

    /// Write the superblock back to its fixed byte-1024 location.
    ///
    /// Used after a mount-time `s_state`/`s_mnt_count` update and after any
    /// operation that changes `s_free_blocks_count`/`s_free_inodes_count`.
    pub fn write_to<B: BlockDevice>(&self, device: &B) -> Result<(), BlockError> {
        let device_block_size = device.block_size();
        let start_block = SUPERBLOCK_OFFSET / device_block_size;
        let offset_in_block = SUPERBLOCK_OFFSET % device_block_size;
        let superblock_size = mem::size_of::<Ext2Superblock>();
        let bytes_needed = offset_in_block + superblock_size;
        let blocks_needed = (bytes_needed + device_block_size - 1) / device_block_size;

        let mut buffer = [0u8; 4096];
        for i in 0..blocks_needed {
            device.read_block(
                (start_block + i) as u64,
                &mut buffer[i * device_block_size..(i + 1) * device_block_size],
            )?;
        }

        let sb_bytes = unsafe {
            core::slice::from_raw_parts(
                self as *const Ext2Superblock as *const u8,
                superblock_size,
            )
        };
        buffer[offset_in_block..offset_in_block + superblock_size].copy_from_slice(sb_bytes);

        for i in 0..blocks_needed {
            device.write_block(
                (start_block + i) as u64,
                &buffer[i * device_block_size..(i + 1) * device_block_size],
            )?;
        }

        Ok(())
    }

    /// Create superblock from a byte slice
    ///
    /// This method is useful for testing and for parsing superblock data
    /// that has already been read into memory.
    ///
    /// # Arguments
    /// * `bytes` - A slice containing at least 1024 bytes of superblock data
    ///
    /// # Returns
    /// * `Some(Ext2Superblock)` - Successfully parsed superblock
    /// * `None` - Slice too small
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let superblock_size = mem::size_of::<Ext2Superblock>();
        if bytes.len() < superblock_size {
            return None;
        }

        // SAFETY: We've verified the slice is large enough.
        // The struct is packed so alignment is not a concern.
        let superblock: Ext2Superblock = unsafe {
            core::ptr::read_unaligned(bytes.as_ptr() as *const Ext2Superblock)
        };

        Some(superblock)
    }
}
