//! Loopback Transport
//!
//! In-process message router implementing the `Transport` port. Every node
//! registers an inbox under its identity; lookups are routed to the target
//! node's inbox, and each lookup gets a synthetic one-shot connection so
//! the eventual reply routes back to the originator's inbox. External
//! clients attach through persistent connections backed by reply channels.
//!
//! Framing, retries and real sockets are deliberately absent; this adapter
//! exists so a whole topology can run inside one process, for the demo
//! binary and the integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::domain::ports::{ConnectionId, NodeId, Transport};
use crate::error::{Error, Result};
use crate::message::{InboundEvent, ReplyMessage, RequestMessage};

enum Endpoint {
    /// Reply routes to this node's inbox; retired after one reply.
    Node(NodeId),
    /// Reply routes to an external client channel; lives until closed.
    Client(mpsc::UnboundedSender<ReplyMessage>),
}

struct NetworkInner {
    inboxes: HashMap<NodeId, mpsc::UnboundedSender<InboundEvent>>,
    connections: HashMap<u64, Endpoint>,
}

/// In-process message network shared by all nodes in a topology.
pub struct LoopbackNetwork {
    inner: Mutex<NetworkInner>,
    next_connection: AtomicU64,
}

impl Default for LoopbackNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackNetwork {
    /// Create an empty network.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(NetworkInner {
                inboxes: HashMap::new(),
                connections: HashMap::new(),
            }),
            next_connection: AtomicU64::new(1),
        }
    }

    /// Register a node and return the inbox its event loop consumes.
    pub fn register(&self, node: NodeId) -> mpsc::UnboundedReceiver<InboundEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().inboxes.insert(node, tx);
        rx
    }

    /// Open a persistent client connection; replies sent on it arrive on
    /// the returned channel.
    pub fn open_client_connection(
        &self,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<ReplyMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_connection.fetch_add(1, Ordering::Relaxed);
        self.inner
            .lock()
            .connections
            .insert(id, Endpoint::Client(tx));
        (ConnectionId(id), rx)
    }

    /// Submit a client request to a node, as if it arrived on `connection`.
    pub fn submit_request(
        &self,
        target: &NodeId,
        request: RequestMessage,
        connection: ConnectionId,
    ) -> Result<()> {
        let inner = self.inner.lock();
        let inbox = inner
            .inboxes
            .get(target)
            .ok_or_else(|| Error::Transport(format!("no node registered as {target}")))?;
        inbox
            .send(InboundEvent::Request {
                request,
                connection,
            })
            .map_err(|_| Error::Transport(format!("inbox for {target} is closed")))
    }

    /// Number of live connections, for leak checks in tests.
    pub fn connection_count(&self) -> usize {
        self.inner.lock().connections.len()
    }
}

#[async_trait]
impl Transport for LoopbackNetwork {
    async fn send_reply(&self, connection: ConnectionId, reply: ReplyMessage) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.connections.get(&connection.0) {
            Some(Endpoint::Node(node)) => {
                let node = node.clone();
                inner.connections.remove(&connection.0);
                let inbox = inner
                    .inboxes
                    .get(&node)
                    .ok_or_else(|| Error::Transport(format!("no node registered as {node}")))?;
                inbox
                    .send(InboundEvent::Reply(reply))
                    .map_err(|_| Error::Transport(format!("inbox for {node} is closed")))
            }
            Some(Endpoint::Client(tx)) => tx
                .send(reply)
                .map_err(|_| Error::Transport(format!("client connection {connection} is gone"))),
            None => Err(Error::Transport(format!(
                "unknown connection {connection}"
            ))),
        }
    }

    async fn close_connection(&self, connection: ConnectionId) -> Result<()> {
        self.inner.lock().connections.remove(&connection.0);
        Ok(())
    }

    async fn dispatch_lookup(&self, target: &NodeId, request: RequestMessage) -> Result<()> {
        let id = self.next_connection.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock();
        let inbox = inner
            .inboxes
            .get(target)
            .cloned()
            .ok_or_else(|| Error::Transport(format!("no node registered as {target}")))?;
        inner
            .connections
            .insert(id, Endpoint::Node(request.originator.clone()));
        inbox
            .send(InboundEvent::Request {
                request,
                connection: ConnectionId(id),
            })
            .map_err(|_| Error::Transport(format!("inbox for {target} is closed")))
    }
}

// =============================================================================
// Tests
// =============================================================================
