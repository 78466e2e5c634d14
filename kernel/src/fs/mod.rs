//! Filesystem abstraction layer
//!
//! Provides the Ext2 filesystem driver and the VFS glue layer it mounts
//! itself into.

#![allow(dead_code)]

pub mod ext2;
pub mod vfs;
