//! Inter-Process Communication (IPC) module
//!
//! This module provides IPC primitives:
//! - Pipes (pipe.rs) - unidirectional byte streams with atomic small writes
//! - Notifier (notify.rs) - decoupled readiness/wake mechanism used by both
//!   pipes and ports, since this crate slice owns no scheduler
//! - Messages (message.rs) - bounded message payloads
//! - Connections (connection.rs) - bidirectional, half-closable message channels
//! - Ports (port.rs) - named rendezvous points connections are established through

pub mod connection;
pub mod message;
pub mod notify;
pub mod pipe;
pub mod port;

// Re-export public API - some of these are not used yet but are part of the public API
pub use connection::{Connection, Side};
pub use message::Message;
pub use notify::{set_waker, Notifier, WaiterId};
pub use pipe::create_pipe;
pub use port::{PortId, PortRegistry, Rights, MAX_PORTS};
