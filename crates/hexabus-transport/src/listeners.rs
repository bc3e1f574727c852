//! Listener registry
//!
//! Maps remote socket addresses to the handler that owns them. The channel
//! loop reads it on every datagram and every flush; handlers and the owner
//! insert into it concurrently.

use hexabus_core::Packet;
use parking_lot::RwLock;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::traits::PacketHandler;

type Entry = (SocketAddr, Arc<dyn PacketHandler>);

/// Ordered address-to-handler table
#[derive(Default)]
pub struct ListenerRegistry {
    entries: RwLock<Vec<Entry>>,
    waker: Arc<Notify>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `addr`. A second registration for the same
    /// address is ignored and returns false.
    pub fn register(&self, addr: SocketAddr, handler: Arc<dyn PacketHandler>) -> bool {
        let mut entries = self.entries.write();
        if entries.iter().any(|(a, _)| *a == addr) {
            trace!("Listener for {} already registered", addr);
            return false;
        }
        entries.push((addr, handler));
        debug!("Registered listener for {}", addr);
        true
    }

    /// Remove the entry for `addr`, but only if it still points at `handler`
    pub fn remove(&self, addr: &SocketAddr, handler: &Arc<dyn PacketHandler>) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(a, h)| !(a == addr && same_handler(h, handler)));
        let removed = entries.len() != before;
        if removed {
            debug!("Removed listener for {}", addr);
        }
        removed
    }

    pub fn get(&self, addr: &SocketAddr) -> Option<Arc<dyn PacketHandler>> {
        self.entries
            .read()
            .iter()
            .find(|(a, _)| a == addr)
            .map(|(_, h)| Arc::clone(h))
    }

    pub fn contains(&self, addr: &SocketAddr) -> bool {
        self.entries.read().iter().any(|(a, _)| a == addr)
    }

    /// Registered addresses in registration order
    pub fn addresses(&self) -> Vec<SocketAddr> {
        self.entries.read().iter().map(|(a, _)| *a).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// One request from every handler that has one, in registration order
    pub fn pending_requests(&self) -> Vec<Packet> {
        // Snapshot first: next_request takes the handler's own lock
        let handlers: Vec<Arc<dyn PacketHandler>> = self
            .entries
            .read()
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();

        handlers.iter().filter_map(|h| h.next_request()).collect()
    }

    /// Interrupt the channel's current receive so it flushes now
    pub fn wake(&self) {
        self.waker.notify_one();
    }

    /// Shared handle for handlers that want to wake the channel later
    pub fn waker(&self) -> Arc<Notify> {
        Arc::clone(&self.waker)
    }

    pub(crate) async fn woken(&self) {
        self.waker.notified().await
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("addresses", &self.addresses())
            .finish()
    }
}

fn same_handler(a: &Arc<dyn PacketHandler>, b: &Arc<dyn PacketHandler>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct Scripted {
        requests: Mutex<VecDeque<Packet>>,
    }

    impl PacketHandler for Scripted {
        fn handle_packet(&self, _packet: Packet, _listeners: &ListenerRegistry) -> bool {
            false
        }

        fn next_request(&self) -> Option<Packet> {
            self.requests.lock().pop_front()
        }
    }

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([0xfe80, 0, 0, 0, 0, 0, 0, 1], port))
    }

    #[test]
    fn test_register_once() {
        let registry = ListenerRegistry::new();
        let first: Arc<dyn PacketHandler> = Arc::new(Scripted::default());
        let second: Arc<dyn PacketHandler> = Arc::new(Scripted::default());

        assert!(registry.register(addr(1), Arc::clone(&first)));
        assert!(!registry.register(addr(1), Arc::clone(&second)));
        assert_eq!(registry.len(), 1);

        let found = registry.get(&addr(1)).unwrap();
        assert!(same_handler(&found, &first));
    }

    #[test]
    fn test_remove_requires_same_handler() {
        let registry = ListenerRegistry::new();
        let first: Arc<dyn PacketHandler> = Arc::new(Scripted::default());
        let other: Arc<dyn PacketHandler> = Arc::new(Scripted::default());
        registry.register(addr(1), Arc::clone(&first));

        assert!(!registry.remove(&addr(1), &other));
        assert!(registry.contains(&addr(1)));

        assert!(registry.remove(&addr(1), &first));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_pending_requests_in_registration_order() {
        let registry = ListenerRegistry::new();
        for port in [3u16, 1, 2] {
            let handler = Scripted::default();
            handler
                .requests
                .lock()
                .push_back(Packet::query(addr(port), port as u8));
            registry.register(addr(port), Arc::new(handler));
        }
        registry.register(addr(9), Arc::new(Scripted::default()));

        let remotes: Vec<u16> = registry
            .pending_requests()
            .iter()
            .map(|p| p.remote.port())
            .collect();
        assert_eq!(remotes, vec![3, 1, 2]);
        assert_eq!(registry.addresses().len(), 4);
    }
}
