//! Crate-wide error type.
//!
//! Every public fallible operation in the VMM, Ext2, and IPC subsystems
//! returns `Result<_, KernelError>`. Layer-local error types (`BlockError`,
//! `fs::vfs::error::VfsError`) keep existing at their own layer and convert
//! into this one at the subsystem boundary, the same way `block::BlockError`
//! already converts from VirtIO driver strings.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    NotImplemented,
    NotSupported,
    WouldBlock,
    Interrupted,
    TimedOut,
    InvalidArg,
    InvalidHandle,
    InvalidAddr,
    InvalidEvent,
    Overflow,
    NoMemory,
    NoHandles,
    NoPorts,
    AlreadyExists,
    NotFound,
    ReadOnly,
    InUse,
    FsFull,
    PermDenied,
    TooLong,
    LinkLimit,
    BufTooSmall,
    DestUnreachable,
    DeviceError,
    NotEmpty,
    CorruptFs,
    DirFull,
    PipeClosed,
    /// Not part of the spec.md enum: used internally for recursive-fault and
    /// lock-ordering guard violations that are documented bugs, not
    /// user-triggerable conditions; callers never match on this value, it
    /// exists so `panic!`-path callers still have a `KernelError` to log.
    Fatal,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KernelError::NotImplemented => "not implemented",
            KernelError::NotSupported => "not supported",
            KernelError::WouldBlock => "would block",
            KernelError::Interrupted => "interrupted",
            KernelError::TimedOut => "timed out",
            KernelError::InvalidArg => "invalid argument",
            KernelError::InvalidHandle => "invalid handle",
            KernelError::InvalidAddr => "invalid address",
            KernelError::InvalidEvent => "invalid event",
            KernelError::Overflow => "overflow",
            KernelError::NoMemory => "out of memory",
            KernelError::NoHandles => "no handles",
            KernelError::NoPorts => "no ports",
            KernelError::AlreadyExists => "already exists",
            KernelError::NotFound => "not found",
            KernelError::ReadOnly => "read only",
            KernelError::InUse => "in use",
            KernelError::FsFull => "filesystem full",
            KernelError::PermDenied => "permission denied",
            KernelError::TooLong => "too long",
            KernelError::LinkLimit => "link limit",
            KernelError::BufTooSmall => "buffer too small",
            KernelError::DestUnreachable => "destination unreachable",
            KernelError::DeviceError => "device error",
            KernelError::NotEmpty => "not empty",
            KernelError::CorruptFs => "corrupt filesystem",
            KernelError::DirFull => "directory full",
            KernelError::PipeClosed => "pipe closed",
            KernelError::Fatal => "fatal invariant violation",
        };
        write!(f, "{}", s)
    }
}

impl From<crate::block::BlockError> for KernelError {
    fn from(e: crate::block::BlockError) -> Self {
        match e {
            crate::block::BlockError::IoError => KernelError::DeviceError,
            crate::block::BlockError::OutOfBounds => KernelError::CorruptFs,
            crate::block::BlockError::DeviceNotReady => KernelError::DeviceError,
            crate::block::BlockError::Timeout => KernelError::TimedOut,
            crate::block::BlockError::NotSupported => KernelError::NotSupported,
        }
    }
}

impl From<crate::fs::vfs::error::VfsError> for KernelError {
    fn from(e: crate::fs::vfs::error::VfsError) -> Self {
        use crate::fs::vfs::error::VfsError;
        match e {
            VfsError::NotFound => KernelError::NotFound,
            VfsError::PermissionDenied => KernelError::PermDenied,
            VfsError::IsDirectory => KernelError::InvalidArg,
            VfsError::NotDirectory => KernelError::InvalidArg,
            VfsError::AlreadyExists => KernelError::AlreadyExists,
            VfsError::NoSpace => KernelError::FsFull,
            VfsError::IoError => KernelError::DeviceError,
            VfsError::InvalidPath => KernelError::InvalidArg,
            VfsError::NotMounted => KernelError::NotFound,
            VfsError::ReadOnly => KernelError::ReadOnly,
            VfsError::TooManyOpenFiles => KernelError::NoHandles,
        }
    }
}
