//! IPC message payloads exchanged over a connection.

use crate::platform_config::IPC_MESSAGE_MAX;
use alloc::vec::Vec;

/// A single queued message: an opaque `msg_type` tag plus an owned payload.
#[derive(Debug, Clone)]
pub struct Message {
    pub msg_type: u32,
    pub payload: Vec<u8>,
}

impl Message {
    /// Build a message, rejecting payloads over `IPC_MESSAGE_MAX`.
    pub fn new(msg_type: u32, payload: &[u8]) -> Result<Self, crate::error::KernelError> {
        if payload.len() > IPC_MESSAGE_MAX {
            return Err(crate::error::KernelError::InvalidArg);
        }
        Ok(Self {
            msg_type,
            payload: payload.to_vec(),
        })
    }
}
