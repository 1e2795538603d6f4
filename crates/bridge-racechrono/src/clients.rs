use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

struct ClientSlot {
    id: u64,
    tx: mpsc::Sender<Bytes>,
}

/// Connected RaceChrono clients keyed by remote endpoint.
///
/// Each client owns a bounded queue drained by its writer task, so a slow
/// reader never stalls the broadcaster or the other clients.
#[derive(Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<SocketAddr, ClientSlot>>,
    next_id: AtomicU64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `addr`, replacing any earlier connection from the same
    /// endpoint. Returns the id the writer task must pass back to
    /// [`remove`](Self::remove).
    pub fn insert(&self, addr: SocketAddr, tx: mpsc::Sender<Bytes>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if self.clients.write().insert(addr, ClientSlot { id, tx }).is_some() {
            debug!(%addr, "replaced existing client");
        }
        id
    }

    /// Removes `addr` only if it still belongs to connection `id`.
    pub fn remove(&self, addr: SocketAddr, id: u64) -> bool {
        let mut clients = self.clients.write();
        match clients.get(&addr) {
            Some(slot) if slot.id == id => {
                clients.remove(&addr);
                true
            }
            _ => false,
        }
    }

    /// Queues `frame` for every client. Clients whose writer has gone are
    /// dropped from the registry; a full queue loses this frame only.
    pub fn broadcast(&self, frame: &Bytes) -> usize {
        let mut closed = Vec::new();
        let mut queued = 0;
        {
            let clients = self.clients.read();
            for (addr, slot) in clients.iter() {
                match slot.tx.try_send(frame.clone()) {
                    Ok(()) => queued += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!(%addr, "client queue full, dropping frame");
                    }
                    Err(TrySendError::Closed(_)) => closed.push((*addr, slot.id)),
                }
            }
        }
        for (addr, id) in closed {
            if self.remove(addr, id) {
                debug!(%addr, "pruned disconnected client");
            }
        }
        queued
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }

    /// Drops every sender, which ends all writer tasks.
    pub fn clear(&self) {
        self.clients.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn broadcast_reaches_every_client() {
        let reg = ClientRegistry::new();
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        reg.insert(addr(1), tx1);
        reg.insert(addr(2), tx2);

        let frame = Bytes::from_static(b"$RC3*00\r\n");
        assert_eq!(reg.broadcast(&frame), 2);
        assert_eq!(rx1.try_recv().ok(), Some(frame.clone()));
        assert_eq!(rx2.try_recv().ok(), Some(frame));
    }

    #[test]
    fn closed_clients_are_pruned() {
        let reg = ClientRegistry::new();
        let (tx1, rx1) = mpsc::channel(4);
        let (tx2, _rx2) = mpsc::channel(4);
        reg.insert(addr(1), tx1);
        reg.insert(addr(2), tx2);
        drop(rx1);

        assert_eq!(reg.broadcast(&Bytes::from_static(b"x")), 1);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn full_queue_drops_frame_but_keeps_client() {
        let reg = ClientRegistry::new();
        let (tx, mut rx) = mpsc::channel(1);
        reg.insert(addr(1), tx);

        assert_eq!(reg.broadcast(&Bytes::from_static(b"first")), 1);
        assert_eq!(reg.broadcast(&Bytes::from_static(b"second")), 0);
        assert_eq!(reg.len(), 1);
        assert_eq!(rx.try_recv().ok(), Some(Bytes::from_static(b"first")));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn stale_remove_does_not_evict_replacement() {
        let reg = ClientRegistry::new();
        let (old_tx, _old_rx) = mpsc::channel(1);
        let (new_tx, mut new_rx) = mpsc::channel(1);
        let old_id = reg.insert(addr(7), old_tx);
        let new_id = reg.insert(addr(7), new_tx);
        assert_ne!(old_id, new_id);

        assert!(!reg.remove(addr(7), old_id));
        assert_eq!(reg.len(), 1);
        reg.broadcast(&Bytes::from_static(b"hi"));
        assert_eq!(new_rx.try_recv().ok(), Some(Bytes::from_static(b"hi")));

        assert!(reg.remove(addr(7), new_id));
        assert!(reg.is_empty());
    }

    #[test]
    fn clear_closes_writer_queues() {
        let reg = ClientRegistry::new();
        let (tx, mut rx) = mpsc::channel::<Bytes>(1);
        reg.insert(addr(1), tx);
        reg.clear();
        assert!(reg.is_empty());
        assert!(matches!(rx.try_recv(), Err(mpsc::error::TryRecvError::Disconnected)));
    }
}
