//! Registry of workers connected to the local server
//!
//! Workers are keyed by the id from their greeting. Names may repeat; sends by
//! name go to the most recently registered worker carrying that name. Every
//! membership change bumps a generation counter that pending receives watch.

use crate::connection::{encode_frame, Inbox, Outbox};
use crate::error::{Result, TransportError};
use codec::Record;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};
use types::Greeting;

/// One live worker connection
#[derive(Debug)]
pub struct Worker {
    pub name: String,
    pub uuid: String,
    pub peer: SocketAddr,
    seq: u64,
    outbound: Outbox,
    inbox: Arc<Mutex<Inbox>>,
}

impl Worker {
    /// Queue a record on this worker's link
    pub fn send(&self, record: &dyn Record) -> Result<()> {
        self.outbound
            .send(encode_frame(record))
            .map_err(|_| {
                TransportError::connection(format!("worker {} is gone", self.name), Some(self.peer))
            })
    }
}

/// Identifies a registration so that only its own connection can remove it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration(u64);

/// A worker inbox lent out for one receive
pub(crate) struct InboxHandle {
    pub name: String,
    pub uuid: String,
    pub inbox: Arc<Mutex<Inbox>>,
}

/// Shared, cloneable table of live workers
#[derive(Clone)]
pub struct WorkerRegistry {
    workers: Arc<RwLock<HashMap<String, Worker>>>,
    next_seq: Arc<AtomicU64>,
    changes: Arc<watch::Sender<u64>>,
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerRegistry {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            workers: Arc::new(RwLock::new(HashMap::new())),
            next_seq: Arc::new(AtomicU64::new(1)),
            changes: Arc::new(changes),
        }
    }

    /// Add a worker after a successful greeting
    ///
    /// Rejected when a worker with the same id is still connected.
    pub fn register(
        &self,
        greeting: &Greeting,
        peer: SocketAddr,
        outbound: Outbox,
        inbox: Inbox,
    ) -> Result<Registration> {
        let mut workers = self.workers.write();
        if let Some(existing) = workers.get(&greeting.uuid) {
            return Err(TransportError::handshake(
                peer,
                format!(
                    "worker id {} is already connected as {}",
                    greeting.uuid, existing.name
                ),
            ));
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        workers.insert(
            greeting.uuid.clone(),
            Worker {
                name: greeting.name.clone(),
                uuid: greeting.uuid.clone(),
                peer,
                seq,
                outbound,
                inbox: Arc::new(Mutex::new(inbox)),
            },
        );
        info!(
            name = %greeting.name,
            uuid = %greeting.uuid,
            %peer,
            total = workers.len(),
            "Registered worker"
        );
        drop(workers);

        self.bump();
        Ok(Registration(seq))
    }

    /// Remove a worker; a stale registration for a reused id is ignored
    pub fn remove(&self, uuid: &str, registration: Registration) -> bool {
        let mut workers = self.workers.write();
        let current = workers
            .get(uuid)
            .is_some_and(|worker| worker.seq == registration.0);
        let removed = if current { workers.remove(uuid) } else { None };
        let total = workers.len();
        drop(workers);

        match removed {
            Some(worker) => {
                info!(name = %worker.name, uuid, total, "Removed worker");
                self.bump();
                true
            }
            None => false,
        }
    }

    /// Drop every worker, closing their links; returns how many there were
    pub fn clear(&self) -> usize {
        let drained = self.workers.write().drain().count();
        if drained > 0 {
            self.bump();
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.workers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.read().is_empty()
    }

    pub fn contains(&self, uuid: &str) -> bool {
        self.workers.read().contains_key(uuid)
    }

    /// Names of live workers, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.workers.read().values().map(|w| w.name.clone()).collect();
        names.sort();
        names
    }

    /// Send to the most recently registered worker called `name`
    pub fn send_to_name(&self, name: &str, record: &dyn Record) -> Result<()> {
        let workers = self.workers.read();
        let worker = workers
            .values()
            .filter(|w| w.name == name)
            .max_by_key(|w| w.seq)
            .ok_or_else(|| TransportError::UnknownWorker { name: name.to_string() })?;
        worker.send(record)
    }

    /// Send to the worker registered under `uuid`
    pub fn send_to_id(&self, uuid: &str, record: &dyn Record) -> Result<()> {
        let workers = self.workers.read();
        let worker = workers
            .get(uuid)
            .ok_or_else(|| TransportError::UnknownWorker { name: uuid.to_string() })?;
        worker.send(record)
    }

    /// Queue `record` for every worker; returns how many accepted it
    pub fn broadcast(&self, record: &dyn Record) -> usize {
        let workers = self.workers.read();
        let mut delivered = 0;
        for worker in workers.values() {
            match worker.send(record) {
                Ok(()) => delivered += 1,
                Err(e) => debug!(name = %worker.name, error = %e, "Broadcast skipped worker"),
            }
        }
        delivered
    }

    /// Subscribe to membership changes
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Inbox handles sorted by uuid, so every caller locks them in one order
    pub(crate) fn inboxes(&self) -> Vec<InboxHandle> {
        let mut handles: Vec<_> = self
            .workers
            .read()
            .values()
            .map(|w| InboxHandle {
                name: w.name.clone(),
                uuid: w.uuid.clone(),
                inbox: w.inbox.clone(),
            })
            .collect();
        handles.sort_by(|a, b| a.uuid.cmp(&b.uuid));
        handles
    }

    fn bump(&self) {
        self.changes.send_modify(|generation| *generation += 1);
    }
}

impl std::fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerRegistry")
            .field("workers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::Message;
    use types::{Command, Opcode};

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn link() -> (Outbox, mpsc::UnboundedReceiver<Message>, Inbox) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (_in_tx, in_rx) = mpsc::unbounded_channel();
        (out_tx, out_rx, in_rx)
    }

    fn decode(message: Message) -> Command {
        let registry = types::registry().unwrap();
        match message {
            Message::Text(text) => registry
                .decode_text(&text)
                .unwrap()
                .downcast::<Command>()
                .unwrap(),
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_register_and_remove() {
        let registry = WorkerRegistry::new();
        let mut changes = registry.subscribe();
        let (out, _out_rx, inbox) = link();

        let registration = registry
            .register(&Greeting::new("u1", "id-1"), peer(), out, inbox)
            .unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("id-1"));
        assert!(changes.has_changed().unwrap());
        changes.borrow_and_update();

        assert!(registry.remove("id-1", registration));
        assert!(registry.is_empty());
        assert!(changes.has_changed().unwrap());
        assert!(!registry.remove("id-1", registration));
    }

    #[tokio::test]
    async fn test_inboxes_follow_uuid_order() {
        let registry = WorkerRegistry::new();
        let mut links = Vec::new();
        for (name, uuid) in [("u3", "id-c"), ("u1", "id-a"), ("u2", "id-b")] {
            let (out, out_rx, inbox) = link();
            registry
                .register(&Greeting::new(name, uuid), peer(), out, inbox)
                .unwrap();
            links.push(out_rx);
        }

        let uuids: Vec<_> = registry.inboxes().into_iter().map(|h| h.uuid).collect();
        assert_eq!(uuids, ["id-a", "id-b", "id-c"]);
    }

    #[tokio::test]
    async fn test_clear_closes_every_link() {
        let registry = WorkerRegistry::new();
        let (out, mut out_rx, inbox) = link();
        registry
            .register(&Greeting::new("u1", "id-1"), peer(), out, inbox)
            .unwrap();

        assert_eq!(registry.clear(), 1);
        assert!(registry.is_empty());
        while let Ok(message) = out_rx.try_recv() {
            assert!(message.is_close());
        }
        assert!(out_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_live_id_is_rejected() {
        let registry = WorkerRegistry::new();
        let (out, _rx1, inbox) = link();
        registry
            .register(&Greeting::new("u1", "same"), peer(), out, inbox)
            .unwrap();

        let (out, _rx2, inbox) = link();
        let err = registry
            .register(&Greeting::new("u2", "same"), peer(), out, inbox)
            .unwrap_err();
        assert!(matches!(err, TransportError::HandshakeFailure { .. }));
        assert_eq!(registry.names(), ["u1"]);
    }

    #[tokio::test]
    async fn test_send_by_name_prefers_latest_registration() {
        let registry = WorkerRegistry::new();
        let (out_a, mut rx_a, inbox_a) = link();
        let (out_b, mut rx_b, inbox_b) = link();
        registry
            .register(&Greeting::new("twin", "first"), peer(), out_a, inbox_a)
            .unwrap();
        registry
            .register(&Greeting::new("twin", "second"), peer(), out_b, inbox_b)
            .unwrap();

        let command = Command::new(Opcode::StopSim);
        registry.send_to_name("twin", &command).unwrap();
        assert_eq!(decode(rx_b.recv().await.unwrap()), command);
        assert!(rx_a.try_recv().is_err());

        let err = registry.send_to_name("nobody", &command).unwrap_err();
        assert!(matches!(err, TransportError::UnknownWorker { .. }));
    }

    #[tokio::test]
    async fn test_broadcast_counts_live_links() {
        let registry = WorkerRegistry::new();
        let (out_a, mut rx_a, inbox_a) = link();
        let (out_b, rx_b, inbox_b) = link();
        registry
            .register(&Greeting::new("a", "1"), peer(), out_a, inbox_a)
            .unwrap();
        registry
            .register(&Greeting::new("b", "2"), peer(), out_b, inbox_b)
            .unwrap();
        drop(rx_b);

        let command = Command::new(Opcode::Noop);
        assert_eq!(registry.broadcast(&command), 1);
        assert_eq!(decode(rx_a.recv().await.unwrap()), command);
    }
}
