//! Shared connection directory backing `CLIENT LIST` / `CLIENT KILL`.
//!
//! The event loop owns every [`Connection`](crate::connection::Connection)
//! directly and refreshes a lightweight snapshot here on each tick. The
//! dispatcher only ever reads snapshots or requests a kill; it never touches
//! a socket directly.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Instant;

/// Point-in-time snapshot of one connection's bookkeeping fields.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub id: u64,
    pub remote_addr: SocketAddr,
    pub connected_at: Instant,
    pub last_activity: Instant,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub subscribed: bool,
}

#[derive(Debug, Default)]
struct Inner {
    clients: BTreeMap<u64, ClientInfo>,
    kill_requests: HashSet<u64>,
}

/// Cheap-to-clone handle shared between the event loop and the dispatcher.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    inner: Rc<RefCell<Inner>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, info: ClientInfo) {
        self.inner.borrow_mut().clients.insert(info.id, info);
    }

    pub fn remove(&self, id: u64) {
        let mut inner = self.inner.borrow_mut();
        inner.clients.remove(&id);
        inner.kill_requests.remove(&id);
    }

    pub fn list(&self) -> Vec<ClientInfo> {
        self.inner.borrow().clients.values().cloned().collect()
    }

    /// Marks `id` for disconnection. Returns `false` if no such client is
    /// currently registered.
    pub fn request_kill(&self, id: u64) -> bool {
        let mut inner = self.inner.borrow_mut();
        if inner.clients.contains_key(&id) {
            inner.kill_requests.insert(id);
            true
        } else {
            false
        }
    }

    /// Whether `id` has a pending kill request. Polled by the event loop
    /// once per tick.
    pub fn is_kill_requested(&self, id: u64) -> bool {
        self.inner.borrow().kill_requests.contains(&id)
    }
}
