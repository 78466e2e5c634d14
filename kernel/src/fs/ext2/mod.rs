//! ext2 filesystem implementation
//!
//! The Second Extended Filesystem (ext2) is a classic Linux filesystem.
//! This module provides structures and functions for parsing ext2 filesystems.

pub mod superblock;
pub mod block_group;
pub mod dir;
pub mod extent;
pub mod inode;
pub mod file;

pub use superblock::*;
pub use block_group::*;
pub use dir::*;
pub use inode::*;
pub use file::*;

use crate::block::ram_disk::MemBlockDevice;
use crate::block::BlockDevice;
use crate::error::KernelError;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;

/// `s_state`: filesystem was unmounted cleanly.
const EXT2_VALID_FS: u16 = 1;
/// `s_state`: filesystem has errors, or is currently mounted read-write
/// (written at mount time, replaced with `EXT2_VALID_FS` at clean unmount).
const EXT2_ERROR_FS: u16 = 2;

/// A mounted ext2 filesystem instance
///
/// Holds the superblock, block group descriptors, and a reference to the
/// underlying block device for filesystem operations. Generic over the
/// block device so the write-path and directory logic can be exercised
/// against any backing (`block::ram_disk::MemBlockDevice` in tests and as
/// the root filesystem backing, since this crate slice has no hardware
/// block driver).
pub struct Ext2Fs<B: BlockDevice = MemBlockDevice> {
    /// The filesystem superblock
    pub superblock: Ext2Superblock,
    /// Block group descriptors
    pub block_groups: Vec<Ext2BlockGroupDesc>,
    /// The underlying block device
    pub device: Arc<B>,
    /// Mount ID for VFS integration
    pub mount_id: usize,
}

impl<B: BlockDevice> Ext2Fs<B> {
    /// Create a new ext2 filesystem instance from a block device
    ///
    /// Reads and validates the superblock and block group descriptors, then
    /// marks the filesystem dirty on disk (`s_state = ERROR_FS`, `s_mnt_count`
    /// bumped) until a clean unmount restores `VALID_FS`.
    pub fn new(device: Arc<B>, mount_id: usize) -> Result<Self, &'static str> {
        let mut superblock = Ext2Superblock::read_from(device.as_ref())
            .map_err(|_| "Failed to read ext2 superblock")?;

        if !superblock.is_valid() {
            return Err("Invalid ext2 magic number");
        }

        let block_groups = Ext2BlockGroupDesc::read_table(device.as_ref(), &superblock)
            .map_err(|_| "Failed to read block group descriptors")?;

        let mnt_count = unsafe { core::ptr::read_unaligned(core::ptr::addr_of!(superblock.s_mnt_count)) };
        unsafe {
            core::ptr::write_unaligned(core::ptr::addr_of_mut!(superblock.s_state), EXT2_ERROR_FS);
            core::ptr::write_unaligned(core::ptr::addr_of_mut!(superblock.s_mnt_count), mnt_count.saturating_add(1));
            core::ptr::write_unaligned(
                core::ptr::addr_of_mut!(superblock.s_mtime),
                crate::time::current_unix_time() as u32,
            );
        }
        superblock
            .write_to(device.as_ref())
            .map_err(|_| "Failed to update superblock at mount time")?;

        Ok(Self {
            superblock,
            block_groups,
            device,
            mount_id,
        })
    }

    /// Mark the filesystem cleanly unmounted (`s_state = VALID_FS`).
    pub fn unmount(&mut self) -> Result<(), &'static str> {
        unsafe {
            core::ptr::write_unaligned(core::ptr::addr_of_mut!(self.superblock.s_state), EXT2_VALID_FS);
            core::ptr::write_unaligned(
                core::ptr::addr_of_mut!(self.superblock.s_wtime),
                crate::time::current_unix_time() as u32,
            );
        }
        self.superblock
            .write_to(self.device.as_ref())
            .map_err(|_| "Failed to write superblock at unmount")?;
        Ext2BlockGroupDesc::write_table(self.device.as_ref(), &self.superblock, &self.block_groups)
            .map_err(|_| "Failed to write block group descriptors at unmount")
    }

    /// Persist the superblock and block group descriptor table. Called
    /// after any operation that changes free-block/free-inode counters.
    fn flush_metadata(&mut self) -> Result<(), &'static str> {
        self.superblock
            .write_to(self.device.as_ref())
            .map_err(|_| "Failed to write superblock")?;
        Ext2BlockGroupDesc::write_table(self.device.as_ref(), &self.superblock, &self.block_groups)
            .map_err(|_| "Failed to write block group descriptors")
    }

    /// Read an inode from the filesystem
    pub fn read_inode(&self, inode_num: u32) -> Result<Ext2Inode, &'static str> {
        Ext2Inode::read_from(
            self.device.as_ref(),
            inode_num,
            &self.superblock,
            &self.block_groups,
        )
        .map_err(|_| "Failed to read inode")
    }

    fn write_inode(&self, inode_num: u32, inode: &Ext2Inode) -> Result<(), &'static str> {
        inode
            .write_to(self.device.as_ref(), inode_num, &self.superblock, &self.block_groups)
            .map_err(|_| "Failed to write inode")
    }

    /// Read directory entries from an inode
    ///
    /// Returns the raw directory data for parsing with DirReader.
    pub fn read_directory(&self, inode: &Ext2Inode) -> Result<Vec<u8>, &'static str> {
        if !inode.is_dir() {
            return Err("Not a directory");
        }
        read_file(self.device.as_ref(), inode, &self.superblock)
            .map_err(|_| "Failed to read directory data")
    }

    /// Look up a path component in a directory
    ///
    /// Returns the inode number of the matching entry, or None if not found.
    pub fn lookup_in_dir(&self, dir_inode: &Ext2Inode, name: &str) -> Result<Option<u32>, &'static str> {
        let dir_data = self.read_directory(dir_inode)?;
        Ok(find_entry(&dir_data, name).map(|entry| entry.inode))
    }

    /// Resolve a path to an inode number
    ///
    /// Walks the directory tree from root, looking up each path component.
    /// Supports absolute paths starting with "/".
    pub fn resolve_path(&self, path: &str) -> Result<u32, &'static str> {
        // Must start with "/"
        if !path.starts_with('/') {
            return Err("Path must be absolute");
        }

        // Start at root inode (always inode 2 in ext2)
        let mut current_inode_num = EXT2_ROOT_INO;

        // Split path into components, skipping empty parts
        for component in path.split('/').filter(|s| !s.is_empty()) {
            // Read the current directory inode
            let current_inode = self.read_inode(current_inode_num)?;

            // Make sure it's a directory
            if !current_inode.is_dir() {
                return Err("Not a directory in path");
            }

            // Look up the component in this directory
            match self.lookup_in_dir(&current_inode, component)? {
                Some(inode_num) => {
                    current_inode_num = inode_num;
                }
                None => {
                    return Err("Path component not found");
                }
            }
        }

        Ok(current_inode_num)
    }

    /// Read file content from an inode
    pub fn read_file_content(&self, inode: &Ext2Inode) -> Result<Vec<u8>, &'static str> {
        read_file(self.device.as_ref(), inode, &self.superblock)
            .map_err(|_| "Failed to read file content")
    }

    /// Read a range of file content from an inode
    pub fn read_file_range(
        &self,
        inode: &Ext2Inode,
        offset: u64,
        length: usize,
    ) -> Result<Vec<u8>, &'static str> {
        read_file_range(self.device.as_ref(), inode, &self.superblock, offset, length)
            .map_err(|_| "Failed to read file range")
    }

    /// Write `data` into `inode_num` at `offset`, allocating blocks on
    /// demand, and persist the updated inode and any block/metadata
    /// counters the allocation touched.
    pub fn write_file_range(&mut self, inode_num: u32, offset: u64, data: &[u8]) -> Result<usize, KernelError> {
        let mut inode = self.read_inode(inode_num).map_err(|_| KernelError::NotFound)?;
        let blocks_before = self.count_free_blocks();

        let written = file::write_file_range(
            self.device.as_ref(),
            &mut inode,
            &self.superblock,
            &mut self.block_groups,
            offset,
            data,
        )
        .map_err(|e| {
            if e.contains("triple-indirect") || e.contains("extent") {
                KernelError::NotSupported
            } else {
                KernelError::DeviceError
            }
        })?;

        self.write_inode(inode_num, &inode).map_err(|_| KernelError::DeviceError)?;

        let blocks_after = self.count_free_blocks();
        if blocks_after != blocks_before {
            unsafe {
                core::ptr::write_unaligned(core::ptr::addr_of_mut!(self.superblock.s_free_blocks_count), blocks_after);
            }
            self.flush_metadata().map_err(|_| KernelError::DeviceError)?;
        }

        Ok(written)
    }

    fn count_free_blocks(&self) -> u32 {
        self.block_groups
            .iter()
            .map(|bg| unsafe { core::ptr::read_unaligned(core::ptr::addr_of!(bg.bg_free_blocks_count)) } as u32)
            .sum()
    }

    fn count_free_inodes(&self) -> u32 {
        self.block_groups
            .iter()
            .map(|bg| unsafe { core::ptr::read_unaligned(core::ptr::addr_of!(bg.bg_free_inodes_count)) } as u32)
            .sum()
    }

    fn sync_free_inodes_count(&mut self) {
        let count = self.count_free_inodes();
        unsafe {
            core::ptr::write_unaligned(core::ptr::addr_of_mut!(self.superblock.s_free_inodes_count), count);
        }
    }

    /// Allocate a new inode and directory entry for `name` inside
    /// `parent_inode_num`. Returns the new inode number.
    pub fn create_entry(
        &mut self,
        parent_inode_num: u32,
        name: &str,
        mode: u16,
        is_dir: bool,
    ) -> Result<u32, KernelError> {
        let parent = self.read_inode(parent_inode_num).map_err(|_| KernelError::NotFound)?;
        if !parent.is_dir() {
            return Err(KernelError::InvalidArg);
        }
        if self.lookup_in_dir(&parent, name).map_err(|_| KernelError::DeviceError)?.is_some() {
            return Err(KernelError::AlreadyExists);
        }

        let new_inode_num = inode::allocate_inode(self.device.as_ref(), &self.superblock, &mut self.block_groups)
            .map_err(|_| KernelError::NoMemory)?;
        let new_inode = if is_dir {
            Ext2Inode::new_directory(mode)
        } else {
            Ext2Inode::new_regular_file(mode)
        };
        self.write_inode(new_inode_num, &new_inode).map_err(|_| KernelError::DeviceError)?;

        if is_dir {
            let block_size = self.superblock.block_size();
            let mut block = alloc::vec![0u8; block_size];
            dir::insert_entry(&mut block, new_inode_num, ".", EXT2_FT_DIR)
                .map_err(|_| KernelError::DirFull)?;
            dir::insert_entry(&mut block, parent_inode_num, "..", EXT2_FT_DIR)
                .map_err(|_| KernelError::DirFull)?;
            self.write_file_range(new_inode_num, 0, &block)
                .map_err(|_| KernelError::DeviceError)?;
            inode::increment_inode_links(self.device.as_ref(), parent_inode_num, &self.superblock, &self.block_groups)
                .map_err(|_| KernelError::DeviceError)?;
        }

        let mut dir_data = self.read_directory(&parent).map_err(|_| KernelError::DeviceError)?;
        let file_type = if is_dir { EXT2_FT_DIR } else { EXT2_FT_REG_FILE };
        if dir::insert_entry(&mut dir_data, new_inode_num, name, file_type).is_err() {
            return Err(KernelError::DirFull);
        }
        self.write_file_range(parent_inode_num, 0, &dir_data)
            .map_err(|_| KernelError::DeviceError)?;

        self.sync_free_inodes_count();
        self.flush_metadata().map_err(|_| KernelError::DeviceError)?;
        Ok(new_inode_num)
    }

    /// Remove the directory entry named `name` from `parent_inode_num` and
    /// drop the target inode's link count, freeing it (and its blocks) once
    /// the last link is gone.
    pub fn unlink(&mut self, parent_inode_num: u32, name: &str) -> Result<(), KernelError> {
        let parent = self.read_inode(parent_inode_num).map_err(|_| KernelError::NotFound)?;
        let target_inode_num = self
            .lookup_in_dir(&parent, name)
            .map_err(|_| KernelError::DeviceError)?
            .ok_or(KernelError::NotFound)?;

        let target = self.read_inode(target_inode_num).map_err(|_| KernelError::DeviceError)?;
        if target.is_dir() {
            let target_data = self.read_directory(&target).map_err(|_| KernelError::DeviceError)?;
            if !dir::is_empty(&target_data) {
                return Err(KernelError::NotEmpty);
            }
        }

        let mut dir_data = self.read_directory(&parent).map_err(|_| KernelError::DeviceError)?;
        dir::remove_entry(&mut dir_data, name).map_err(|_| KernelError::NotFound)?;
        self.write_file_range(parent_inode_num, 0, &dir_data)
            .map_err(|_| KernelError::DeviceError)?;

        inode::decrement_inode_links(self.device.as_ref(), target_inode_num, &self.superblock, &mut self.block_groups)
            .map_err(|_| KernelError::DeviceError)?;

        let blocks_after = self.count_free_blocks();
        unsafe {
            core::ptr::write_unaligned(core::ptr::addr_of_mut!(self.superblock.s_free_blocks_count), blocks_after);
        }
        self.sync_free_inodes_count();
        self.flush_metadata().map_err(|_| KernelError::DeviceError)?;
        Ok(())
    }

    /// Free every data block held by `inode_num` and reset its size to zero.
    /// Fails with `NotImplemented` if the inode has a triple-indirect block,
    /// matching `inode::truncate`'s full-zero-only guarantee.
    pub fn truncate(&mut self, inode_num: u32) -> Result<(), KernelError> {
        inode::truncate(self.device.as_ref(), inode_num, &self.superblock, &mut self.block_groups)?;

        let blocks_after = self.count_free_blocks();
        unsafe {
            core::ptr::write_unaligned(core::ptr::addr_of_mut!(self.superblock.s_free_blocks_count), blocks_after);
        }
        self.flush_metadata().map_err(|_| KernelError::DeviceError)?;
        Ok(())
    }
}

/// Global mounted ext2 root filesystem
static ROOT_EXT2: Mutex<Option<Ext2Fs>> = Mutex::new(None);

/// Mount the root ext2 filesystem over `device`.
///
/// This crate slice has no hardware block driver, so the caller is
/// responsible for producing a populated `MemBlockDevice` (e.g. a disk
/// image loaded into memory at boot) to mount.
pub fn init_root_fs(device: Arc<MemBlockDevice>) -> Result<(), &'static str> {
    // Register with VFS mount system
    let mount_id = crate::fs::vfs::mount("/", "ext2");

    // Create the ext2 filesystem instance
    let fs = Ext2Fs::new(device, mount_id)?;

    // Read packed struct fields safely before logging
    let blocks_count = unsafe {
        core::ptr::read_unaligned(core::ptr::addr_of!(fs.superblock.s_blocks_count))
    };
    let inodes_count = unsafe {
        core::ptr::read_unaligned(core::ptr::addr_of!(fs.superblock.s_inodes_count))
    };
    log::info!(
        "ext2: Mounted root filesystem - {} blocks, {} inodes, block size {}",
        blocks_count,
        inodes_count,
        fs.superblock.block_size()
    );

    // Store globally
    *ROOT_EXT2.lock() = Some(fs);

    Ok(())
}

/// Access the root ext2 filesystem
///
/// Returns None if the filesystem hasn't been initialized yet.
pub fn root_fs() -> spin::MutexGuard<'static, Option<Ext2Fs>> {
    ROOT_EXT2.lock()
}

/// Check if the root filesystem is mounted
pub fn is_mounted() -> bool {
    ROOT_EXT2.lock().is_some()
}
