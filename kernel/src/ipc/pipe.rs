//! Pipe buffer implementation
//!
//! Pipes provide unidirectional byte streams for inter-process communication.
//! This module implements the kernel-side pipe buffer that connects the
//! read and write ends of a pipe.
//!
//! Writes smaller than `PIPE_SIZE` are atomic: a write either lands in full
//! or not at all, never interleaved with another writer's bytes. Writes of
//! `PIPE_SIZE` or more may be split across multiple partial writes, same as
//! POSIX `PIPE_BUF` semantics.

use crate::ipc::notify::{Notifier, WaiterId};
use crate::platform_config::PIPE_SIZE;
use alloc::vec::Vec;

/// Pipe buffer - a circular buffer with reader/writer tracking
pub struct PipeBuffer {
    buffer: Vec<u8>,
    read_pos: usize,
    write_pos: usize,
    len: usize,
    /// Number of active readers (0 = broken pipe on write)
    readers: usize,
    /// Number of active writers (0 = EOF on read)
    writers: usize,
    read_waiters: Notifier,
    write_waiters: Notifier,
}

/// Pipe operation result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeError {
    /// No readers remain; writing is impossible.
    BrokenPipe,
    /// The call would have to block to make progress.
    WouldBlock,
}

impl PipeBuffer {
    pub fn new() -> Self {
        PipeBuffer {
            buffer: alloc::vec![0u8; PIPE_SIZE],
            read_pos: 0,
            write_pos: 0,
            len: 0,
            readers: 1,
            writers: 1,
            read_waiters: Notifier::new(),
            write_waiters: Notifier::new(),
        }
    }

    /// Read up to `buf.len()` bytes. `Ok(0)` means EOF (no writers and
    /// buffer empty); `Err(WouldBlock)` means the buffer is empty but a
    /// writer could still produce data.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, PipeError> {
        if self.len == 0 {
            if self.writers == 0 {
                return Ok(0);
            }
            return Err(PipeError::WouldBlock);
        }

        let to_read = buf.len().min(self.len);
        for slot in buf.iter_mut().take(to_read) {
            *slot = self.buffer[self.read_pos];
            self.read_pos = (self.read_pos + 1) % PIPE_SIZE;
        }
        self.len -= to_read;

        if to_read > 0 {
            self.write_waiters.notify_all();
        }
        Ok(to_read)
    }

    /// Write `buf` to the pipe.
    ///
    /// If `buf.len() < PIPE_SIZE`, the write is atomic: it either writes all
    /// of `buf` or, if there isn't enough contiguous space, returns
    /// `WouldBlock` without writing any of it. Writes of `PIPE_SIZE` or more
    /// may return a short count.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, PipeError> {
        if self.readers == 0 {
            return Err(PipeError::BrokenPipe);
        }

        let available = PIPE_SIZE - self.len;
        if available == 0 {
            return Err(PipeError::WouldBlock);
        }

        let atomic = buf.len() < PIPE_SIZE;
        if atomic && available < buf.len() {
            return Err(PipeError::WouldBlock);
        }

        let to_write = buf.len().min(available);
        for &byte in buf.iter().take(to_write) {
            self.buffer[self.write_pos] = byte;
            self.write_pos = (self.write_pos + 1) % PIPE_SIZE;
        }
        self.len += to_write;

        if to_write > 0 {
            self.read_waiters.notify_all();
        }
        Ok(to_write)
    }

    /// `wait(write)` readiness per the atomicity rule: ready only once there
    /// is room for another write and a reader could still consume it.
    pub fn is_writable(&self) -> bool {
        self.len < PIPE_SIZE && self.readers > 0
    }

    /// `wait(read)` readiness: ready when there's data, or the pipe is at EOF.
    pub fn is_readable(&self) -> bool {
        self.len > 0 || self.writers == 0
    }

    pub fn close_read(&mut self) {
        if self.readers > 0 {
            self.readers -= 1;
            if self.readers == 0 {
                // Writers blocked on space now get BrokenPipe instead.
                self.write_waiters.notify_all();
            }
        }
    }

    pub fn close_write(&mut self) {
        if self.writers > 0 {
            self.writers -= 1;
            if self.writers == 0 {
                self.read_waiters.notify_all();
            }
        }
    }

    pub fn add_reader(&mut self) {
        self.readers += 1;
    }

    pub fn add_writer(&mut self) {
        self.writers += 1;
    }

    pub fn add_read_waiter(&mut self, id: WaiterId) {
        self.read_waiters.register(id);
    }

    pub fn remove_read_waiter(&mut self, id: WaiterId) {
        self.read_waiters.unregister(id);
    }

    pub fn add_write_waiter(&mut self, id: WaiterId) {
        self.write_waiters.register(id);
    }

    pub fn remove_write_waiter(&mut self, id: WaiterId) {
        self.write_waiters.unregister(id);
    }

    pub fn available(&self) -> usize {
        self.len
    }

    pub fn space(&self) -> usize {
        PIPE_SIZE - self.len
    }

    pub fn has_readers(&self) -> bool {
        self.readers > 0
    }

    pub fn has_writers(&self) -> bool {
        self.writers > 0
    }
}

impl Default for PipeBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a new pipe, returning (read_end, write_end) sharing one buffer.
pub fn create_pipe() -> (
    alloc::sync::Arc<spin::Mutex<PipeBuffer>>,
    alloc::sync::Arc<spin::Mutex<PipeBuffer>>,
) {
    let buffer = alloc::sync::Arc::new(spin::Mutex::new(PipeBuffer::new()));
    (buffer.clone(), buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn small_write_is_atomic_or_blocks() {
        let mut pipe = PipeBuffer::new();
        // Fill to within 10 bytes of capacity.
        let filler = alloc::vec![0xAAu8; PIPE_SIZE - 10];
        assert_eq!(pipe.write(&filler).unwrap(), filler.len());

        // A sub-PIPE_SIZE write bigger than remaining space must not partially land.
        let msg = alloc::vec![0xBBu8; 20];
        assert_eq!(pipe.write(&msg), Err(PipeError::WouldBlock));
        assert_eq!(pipe.available(), filler.len());
    }

    #[test_case]
    fn large_write_may_be_short() {
        let mut pipe = PipeBuffer::new();
        let huge = alloc::vec![0xCCu8; PIPE_SIZE + 100];
        let written = pipe.write(&huge).unwrap();
        assert_eq!(written, PIPE_SIZE);
    }

    #[test_case]
    fn read_reports_eof_after_last_writer_closes() {
        let mut pipe = PipeBuffer::new();
        pipe.close_write();
        let mut buf = [0u8; 8];
        assert_eq!(pipe.read(&mut buf).unwrap(), 0);
    }

    #[test_case]
    fn read_blocks_while_writer_open_and_buffer_empty() {
        let mut pipe = PipeBuffer::new();
        let mut buf = [0u8; 8];
        assert_eq!(pipe.read(&mut buf), Err(PipeError::WouldBlock));
    }

    #[test_case]
    fn write_after_readers_gone_is_broken_pipe() {
        let mut pipe = PipeBuffer::new();
        pipe.close_read();
        assert_eq!(pipe.write(b"hi"), Err(PipeError::BrokenPipe));
    }

    #[test_case]
    fn readiness_predicates_match_spec() {
        let mut pipe = PipeBuffer::new();
        assert!(pipe.is_writable());
        assert!(!pipe.is_readable());

        pipe.write(b"x").unwrap();
        assert!(pipe.is_readable());

        pipe.close_write();
        assert!(pipe.is_readable()); // EOF counts as readable
    }
}
