//! Decoupled wake mechanism for blocking IPC primitives.
//!
//! Pipes and ports need to wake whichever thread is blocked waiting for a
//! readiness condition (`space`, `data`, `connect`), but this crate slice
//! owns no scheduler to call `unblock()` on directly. A `Notifier` tracks
//! waiter ids and hands them to a single registered wake function when the
//! condition it guards changes; a host kernel wires that function to its
//! own scheduler via `set_waker`.

use alloc::vec::Vec;
use spin::Mutex;

pub type WaiterId = u64;

static WAKER: Mutex<Option<fn(WaiterId)>> = Mutex::new(None);

/// Register the function used to wake a waiter id. Call once during kernel
/// init; until this is called, `Notifier::notify_all` is a no-op beyond
/// clearing its waiter list.
pub fn set_waker(f: fn(WaiterId)) {
    *WAKER.lock() = Some(f);
}

/// A list of threads blocked on some readiness condition.
#[derive(Default)]
pub struct Notifier {
    waiters: Vec<WaiterId>,
}

impl Notifier {
    pub const fn new() -> Self {
        Self { waiters: Vec::new() }
    }

    /// Register `id` as waiting, if not already present.
    pub fn register(&mut self, id: WaiterId) {
        if !self.waiters.contains(&id) {
            self.waiters.push(id);
        }
    }

    /// Remove `id` from the wait list without waking it.
    pub fn unregister(&mut self, id: WaiterId) {
        self.waiters.retain(|&w| w != id);
    }

    /// Wake every registered waiter and clear the list.
    pub fn notify_all(&mut self) {
        let waiters: Vec<WaiterId> = self.waiters.drain(..).collect();
        let waker = *WAKER.lock();
        if let Some(f) = waker {
            for id in waiters {
                f(id);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}
