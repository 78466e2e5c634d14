//! Bidirectional IPC connections.
//!
//! A connection has two endpoints, client and server, each with its own
//! bounded message queue. `space_sem` starts at `IPC_QUEUE_MAX` and is spent
//! by `send` and refunded by `receive`; `data_sem` is the inverse, counting
//! messages available to the reader. Both are modeled as plain counters
//! rather than blocking semaphores — callers poll `WouldBlock` and wait on
//! the matching notifier, the same non-blocking-core/notifier-wakes-caller
//! split `ipc::pipe` uses, since this crate slice owns no scheduler to
//! suspend a thread on.

use crate::error::KernelError;
use crate::ipc::message::Message;
use crate::ipc::notify::Notifier;
use crate::platform_config::IPC_QUEUE_MAX;
use alloc::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Server,
}

impl Side {
    fn other(self) -> Side {
        match self {
            Side::Client => Side::Server,
            Side::Server => Side::Client,
        }
    }
}

struct Endpoint {
    queue: VecDeque<Message>,
    /// Units of queue capacity remaining (`IPC_QUEUE_MAX` − `queue.len()`).
    space_sem: usize,
    open: bool,
    msg_notifier: Notifier,
    hangup_notifier: Notifier,
}

impl Endpoint {
    fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            space_sem: IPC_QUEUE_MAX,
            open: true,
            msg_notifier: Notifier::new(),
            hangup_notifier: Notifier::new(),
        }
    }
}

/// Shared state for both ends of one connection. Endpoint operations take
/// this connection's lock exclusively (see `kernel::ipc` locking notes);
/// there is no finer-grained per-endpoint lock.
pub struct Connection {
    client: Endpoint,
    server: Endpoint,
    refcount: usize,
}

impl Connection {
    /// A fresh connection with both endpoints open and empty, refcount 1
    /// (the caller's handle on whichever side created it).
    pub fn new() -> Self {
        Self {
            client: Endpoint::new(),
            server: Endpoint::new(),
            refcount: 1,
        }
    }

    fn endpoint(&self, side: Side) -> &Endpoint {
        match side {
            Side::Client => &self.client,
            Side::Server => &self.server,
        }
    }

    fn endpoint_mut(&mut self, side: Side) -> &mut Endpoint {
        match side {
            Side::Client => &mut self.client,
            Side::Server => &mut self.server,
        }
    }

    pub fn add_ref(&mut self) {
        self.refcount += 1;
    }

    /// Drop a reference; returns `true` once the last one is gone and the
    /// connection can be torn down by the caller (the port/registry owns
    /// removing it from whatever list holds it).
    pub fn release(&mut self) -> bool {
        self.refcount = self.refcount.saturating_sub(1);
        self.refcount == 0
    }

    /// Send `msg_type`/`buf` from `side` to its peer.
    ///
    /// Returns `DestUnreachable` if the peer has hung up, `WouldBlock` if
    /// the peer's queue is full (caller should wait on nothing here — the
    /// peer's next `receive` fires this endpoint's own notifier indirectly
    /// by freeing space; callers retry after being woken by their own
    /// readiness poll), or `InvalidArg` for an oversized payload.
    pub fn send(&mut self, side: Side, msg_type: u32, buf: &[u8]) -> Result<(), KernelError> {
        let message = Message::new(msg_type, buf)?;
        let peer_side = side.other();

        if !self.endpoint(peer_side).open {
            return Err(KernelError::DestUnreachable);
        }

        let peer = self.endpoint_mut(peer_side);
        if peer.space_sem == 0 {
            return Err(KernelError::WouldBlock);
        }
        peer.space_sem -= 1;
        peer.queue.push_back(message);
        peer.msg_notifier.notify_all();
        Ok(())
    }

    /// Copy the next message's `(type, len)` on `side`'s queue without
    /// removing it. `WouldBlock` if the queue is empty.
    pub fn peek(&self, side: Side) -> Result<(u32, usize), KernelError> {
        self.endpoint(side)
            .queue
            .front()
            .map(|m| (m.msg_type, m.payload.len()))
            .ok_or(KernelError::WouldBlock)
    }

    /// Pop the next message on `side`'s queue into `buf`, truncating if
    /// `buf` is shorter than the payload. Returns `(msg_type, bytes_copied)`.
    pub fn receive(&mut self, side: Side, buf: &mut [u8]) -> Result<(u32, usize), KernelError> {
        let endpoint = self.endpoint_mut(side);
        let message = endpoint.queue.pop_front().ok_or(KernelError::WouldBlock)?;
        let n = buf.len().min(message.payload.len());
        buf[..n].copy_from_slice(&message.payload[..n]);
        endpoint.space_sem = (endpoint.space_sem + 1).min(IPC_QUEUE_MAX);
        Ok((message.msg_type, n))
    }

    /// Readiness for `send`/`peek`/`receive` without mutating state.
    pub fn is_send_ready(&self, side: Side) -> bool {
        let peer = self.endpoint(side.other());
        peer.open && peer.space_sem > 0
    }

    pub fn is_receive_ready(&self, side: Side) -> bool {
        !self.endpoint(side).queue.is_empty() || !self.endpoint(side.other()).open
    }

    pub fn register_msg_waiter(&mut self, side: Side, waiter: u64) {
        self.endpoint_mut(side).msg_notifier.register(waiter);
    }

    pub fn register_hangup_waiter(&mut self, side: Side, waiter: u64) {
        self.endpoint_mut(side).hangup_notifier.register(waiter);
    }

    /// Half-close `side`: mark it closed, discard its queued messages
    /// (returning how many slots that frees), and wake both sides' waiters
    /// so a blocked peer sees `DestUnreachable`/EOF rather than hanging.
    pub fn close_endpoint(&mut self, side: Side) -> usize {
        let freed = {
            let endpoint = self.endpoint_mut(side);
            let freed = endpoint.queue.len();
            endpoint.queue.clear();
            endpoint.open = false;
            endpoint.msg_notifier.notify_all();
            freed
        };
        let peer = self.endpoint_mut(side.other());
        peer.msg_notifier.notify_all();
        peer.hangup_notifier.notify_all();
        freed
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn send_then_receive_round_trips() {
        let mut conn = Connection::new();
        conn.send(Side::Client, 7, b"hello").unwrap();
        assert!(conn.is_receive_ready(Side::Server));

        let mut buf = [0u8; 16];
        let (ty, n) = conn.receive(Side::Server, &mut buf).unwrap();
        assert_eq!(ty, 7);
        assert_eq!(&buf[..n], b"hello");
    }

    #[test_case]
    fn send_after_hangup_is_dest_unreachable() {
        let mut conn = Connection::new();
        conn.close_endpoint(Side::Server);
        assert_eq!(conn.send(Side::Client, 1, b"x"), Err(KernelError::DestUnreachable));
    }

    #[test_case]
    fn queue_depth_capped_at_ipc_queue_max() {
        let mut conn = Connection::new();
        for _ in 0..IPC_QUEUE_MAX {
            conn.send(Side::Client, 0, b"x").unwrap();
        }
        assert_eq!(conn.send(Side::Client, 0, b"x"), Err(KernelError::WouldBlock));
    }

    #[test_case]
    fn receive_on_empty_queue_after_peer_close_is_eof_ready() {
        let mut conn = Connection::new();
        conn.close_endpoint(Side::Client);
        assert!(conn.is_receive_ready(Side::Server));
        let mut buf = [0u8; 4];
        assert_eq!(conn.receive(Side::Server, &mut buf), Err(KernelError::WouldBlock));
    }

    #[test_case]
    fn oversized_payload_is_invalid_arg() {
        let mut conn = Connection::new();
        let huge = alloc::vec![0u8; crate::platform_config::IPC_MESSAGE_MAX + 1];
        assert_eq!(conn.send(Side::Client, 0, &huge), Err(KernelError::InvalidArg));
    }
}
