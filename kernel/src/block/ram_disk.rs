//! In-memory block device backing. This crate slice carries no hardware
//! block driver, so this is the only `BlockDevice` implementation ext2
//! mounts over, both in tests and for a root filesystem populated by
//! whatever loaded the kernel image.

use crate::block::{BlockDevice, BlockError};
use alloc::vec;
use alloc::vec::Vec;
use spin::Mutex;

pub struct MemBlockDevice {
    block_size: usize,
    blocks: Mutex<Vec<u8>>,
}

impl MemBlockDevice {
    pub fn new(block_size: usize, num_blocks: u64) -> Self {
        Self {
            block_size,
            blocks: Mutex::new(vec![0u8; block_size * num_blocks as usize]),
        }
    }

    /// Overwrite a byte range directly, for seeding a superblock/bitmap fixture.
    pub fn seed(&self, offset: usize, data: &[u8]) {
        let mut blocks = self.blocks.lock();
        blocks[offset..offset + data.len()].copy_from_slice(data);
    }
}

impl BlockDevice for MemBlockDevice {
    fn read_block(&self, block: u64, buf: &mut [u8]) -> Result<(), BlockError> {
        let blocks = self.blocks.lock();
        let start = block as usize * self.block_size;
        let end = start + self.block_size;
        if end > blocks.len() || buf.len() != self.block_size {
            return Err(BlockError::OutOfBounds);
        }
        buf.copy_from_slice(&blocks[start..end]);
        Ok(())
    }

    fn write_block(&self, block: u64, buf: &[u8]) -> Result<(), BlockError> {
        let mut blocks = self.blocks.lock();
        let start = block as usize * self.block_size;
        let end = start + self.block_size;
        if end > blocks.len() || buf.len() != self.block_size {
            return Err(BlockError::OutOfBounds);
        }
        blocks[start..end].copy_from_slice(buf);
        Ok(())
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn num_blocks(&self) -> u64 {
        (self.blocks.lock().len() / self.block_size) as u64
    }

    fn flush(&self) -> Result<(), BlockError> {
        Ok(())
    }
}
