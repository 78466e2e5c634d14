//! IPC ports: named rendezvous points connections are established through.
//!
//! A port is created by one owner, who may grant other holders `CONNECT`
//! rights (to dial in) and/or `LISTEN` rights (to accept incoming dials) via
//! a small ACL. The registry hands out `PortId`s from a bounded pool — once
//! 65535 ports exist, creation fails with `NoPorts` rather than growing
//! unbounded.

use crate::error::KernelError;
use crate::ipc::connection::Connection;
use crate::ipc::notify::Notifier;
use alloc::collections::{BTreeMap, VecDeque};
use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;

pub const MAX_PORTS: usize = 65535;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PortId(pub u16);

/// Port ACL rights bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rights(u8);

impl Rights {
    pub const CONNECT: Self = Self(0b01);
    pub const LISTEN: Self = Self(0b10);

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl core::ops::BitOr for Rights {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

struct Acl {
    owner: u32,
    /// Rights granted to holders other than the owner.
    others: Rights,
}

/// One port: an id, its ACL, and the queue of not-yet-accepted incoming
/// connection attempts a `LISTEN`-rights holder drains via `port_listen`.
struct Port {
    acl: Acl,
    backlog: VecDeque<Arc<Mutex<Connection>>>,
    connect_waiters: Notifier,
    /// Woken when an entry is pushed onto `backlog`.
    listen_waiters: Notifier,
}

/// Registry of all live ports, outermost lock in the port/connection nesting
/// order (registry -> port -> connection).
pub struct PortRegistry {
    ports: BTreeMap<PortId, Port>,
    free_ids: VecDeque<u16>,
    next_id: u32,
}

impl PortRegistry {
    pub fn new() -> Self {
        Self {
            ports: BTreeMap::new(),
            free_ids: VecDeque::new(),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> Result<PortId, KernelError> {
        if let Some(id) = self.free_ids.pop_front() {
            return Ok(PortId(id));
        }
        if self.next_id as usize > MAX_PORTS {
            return Err(KernelError::NoPorts);
        }
        let id = self.next_id as u16;
        self.next_id += 1;
        Ok(PortId(id))
    }

    /// Create a port owned by `owner`, granting `others` to everyone else.
    pub fn create_port(&mut self, owner: u32, others: Rights) -> Result<PortId, KernelError> {
        let id = self.allocate_id()?;
        self.ports.insert(
            id,
            Port {
                acl: Acl { owner, others },
                backlog: VecDeque::new(),
                connect_waiters: Notifier::new(),
                listen_waiters: Notifier::new(),
            },
        );
        Ok(id)
    }

    fn rights_for(&self, port: &Port, holder: u32) -> Rights {
        if holder == port.acl.owner {
            Rights::CONNECT | Rights::LISTEN
        } else {
            port.acl.others
        }
    }

    /// Dial `port_id` as `holder`, queuing a fresh connection's server-side
    /// handle on the port's backlog. Returns the new connection (client side
    /// is the caller's). `NotFound` if the port doesn't exist, `PermDenied`
    /// if `holder` lacks `CONNECT`.
    pub fn connection_open(
        &mut self,
        port_id: PortId,
        holder: u32,
    ) -> Result<Arc<Mutex<Connection>>, KernelError> {
        let port = self.ports.get_mut(&port_id).ok_or(KernelError::NotFound)?;
        if !self.rights_for(port, holder).contains(Rights::CONNECT) {
            return Err(KernelError::PermDenied);
        }
        let conn = Arc::new(Mutex::new(Connection::new()));
        conn.lock().add_ref();
        port.backlog.push_back(conn.clone());
        port.listen_waiters.notify_all();
        Ok(conn)
    }

    /// Accept the next queued connection attempt on `port_id` as `holder`.
    /// `WouldBlock` if the backlog is empty, `PermDenied` without `LISTEN`.
    pub fn port_listen(
        &mut self,
        port_id: PortId,
        holder: u32,
    ) -> Result<Arc<Mutex<Connection>>, KernelError> {
        let port = self.ports.get_mut(&port_id).ok_or(KernelError::NotFound)?;
        if !self.rights_for(port, holder).contains(Rights::LISTEN) {
            return Err(KernelError::PermDenied);
        }
        port.backlog.pop_front().ok_or(KernelError::WouldBlock)
    }

    /// Create a connection whose client and server ends are both held by the
    /// same caller, bypassing the backlog entirely — used for loopback
    /// testing/self-talk without a listener on the other end.
    pub fn port_loopback(
        &mut self,
        port_id: PortId,
        holder: u32,
    ) -> Result<Arc<Mutex<Connection>>, KernelError> {
        let port = self.ports.get(&port_id).ok_or(KernelError::NotFound)?;
        let rights = self.rights_for(port, holder);
        if !rights.contains(Rights::CONNECT) || !rights.contains(Rights::LISTEN) {
            return Err(KernelError::PermDenied);
        }
        let conn = Arc::new(Mutex::new(Connection::new()));
        conn.lock().add_ref();
        Ok(conn)
    }

    pub fn register_listen_waiter(&mut self, port_id: PortId, waiter: u64) -> Result<(), KernelError> {
        let port = self.ports.get_mut(&port_id).ok_or(KernelError::NotFound)?;
        port.listen_waiters.register(waiter);
        Ok(())
    }

    pub fn backlog_len(&self, port_id: PortId) -> Result<usize, KernelError> {
        Ok(self.ports.get(&port_id).ok_or(KernelError::NotFound)?.backlog.len())
    }

    /// Three-step teardown when a port's last reference drops: wake anyone
    /// still waiting to connect or listen with `NotFound` (done by waking
    /// the notifiers — callers re-poll and observe the port is gone), drop
    /// every queued/established connection's server-side handle (mutual
    /// disconnect happens via `Connection::close_endpoint` as those `Arc`s
    /// are released), then return the id to the free pool.
    pub fn destroy_port(&mut self, port_id: PortId) {
        if let Some(mut port) = self.ports.remove(&port_id) {
            port.connect_waiters.notify_all();
            port.listen_waiters.notify_all();
            let pending: Vec<_> = port.backlog.drain(..).collect();
            for conn in pending {
                conn.lock().close_endpoint(crate::ipc::connection::Side::Server);
            }
        }
        self.free_ids.push_back(port_id.0);
    }
}

impl Default for PortRegistry {
    fn default() -> Self {
        Self::new()
    }
}
