//! Edge Node Facade
//!
//! The externally-facing operations of one caching edge node: handle an
//! inbound request, handle an inbound reply, expire overdue lookups. The
//! facade orchestrates the LRU cache, the pending-request table and the
//! resolution state machine, and performs all transport I/O through the
//! injected [`Transport`] handle.
//!
//! # Control Flow
//!
//! ```text
//! request ──▶ cache hit ───────────────▶ synthesized 200 reply
//!         └─▶ miss ──▶ admit ──▶ dispatch lookup (peer first)
//!
//! reply ──▶ settle ──▶ escalate ──▶ dispatch lookup (origin)
//!                  └─▶ deliver ──▶ fan-out to waiters [+ cache put]
//! ```
//!
//! One inbound event is fully processed before the next when driven through
//! [`EdgeNode::run`]; the table serializes per-correlation mutations either
//! way.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::counters::{CountersSnapshot, ServiceCounters};
use super::pending::{Admission, PendingRequest, PendingTable, SettleOutcome, Waiter};
use super::resolution::LookupTarget;
use crate::cache::{CacheEntry, CacheStats, LruCache};
use crate::config::NodeConfig;
use crate::domain::events::NodeEvent;
use crate::domain::ports::{ConnectionId, CorrelationId, EventSink, NodeId, Transport};
use crate::error::{Error, Result};
use crate::message::{ContentType, InboundEvent, ReplyMessage, RequestMessage, StatusCode};

/// One caching edge node.
pub struct EdgeNode {
    config: NodeConfig,
    cache: LruCache,
    pending: PendingTable,
    transport: Arc<dyn Transport>,
    events: Arc<dyn EventSink>,
    counters: ServiceCounters,
}

impl EdgeNode {
    /// Build a node from a validated configuration and injected ports.
    pub fn new(
        config: NodeConfig,
        transport: Arc<dyn Transport>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            cache: LruCache::new(config.cache_capacity),
            pending: PendingTable::new(),
            config,
            transport,
            events,
            counters: ServiceCounters::new(),
        })
    }

    /// This node's identity.
    pub fn id(&self) -> &NodeId {
        &self.config.node_id
    }

    /// Observable service counters.
    pub fn counters(&self) -> &ServiceCounters {
        &self.counters
    }

    /// Snapshot of the observable counters.
    pub fn counters_snapshot(&self) -> CountersSnapshot {
        self.counters.snapshot()
    }

    /// Snapshot of the cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Number of outstanding resolutions.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Direct access to the cache, for inspection.
    pub fn cache(&self) -> &LruCache {
        &self.cache
    }

    // =========================================================================
    // Inbound Request
    // =========================================================================

    /// Handle an inbound resource request arriving on `connection`.
    pub async fn handle_request(
        &self,
        request: RequestMessage,
        connection: ConnectionId,
    ) -> Result<()> {
        let key = match request.resource_key() {
            Ok(key) => key,
            Err(Error::MalformedRequest(line)) => {
                return self.reject_malformed(request, connection, line).await;
            }
            Err(e) => return Err(e),
        };

        let category = ContentType::from_key(&key);
        self.counters.record_served(category);
        if category == ContentType::Unknown {
            warn!(node = %self.id(), resource = %key, "request for unknown resource category");
        }

        if self.cache.exists(&key) {
            if let Ok(entry) = self.cache.get(&key) {
                return self.serve_hit(&key, entry, &request, connection).await;
            }
            // Entry evicted between exists and get; resolve as a miss.
        }

        if request.originator == self.config.peer_id {
            return self.refuse_peer_lookup(&key, &request, connection).await;
        }

        self.begin_resolution(key, request, connection).await
    }

    /// Serve a request straight from the cache.
    async fn serve_hit(
        &self,
        key: &str,
        entry: CacheEntry,
        request: &RequestMessage,
        connection: ConnectionId,
    ) -> Result<()> {
        debug!(node = %self.id(), resource = %key, "cache hit");
        let reply = ReplyMessage::ok(
            entry.payload().clone(),
            entry.content_type(),
            request.correlation_id,
            self.id().clone(),
        );
        self.transport.send_reply(connection, reply).await?;
        self.events
            .emit(NodeEvent::cache_hit(self.id().as_str(), key))
            .await
    }

    /// Refuse a lookup from the configured peer for a key we do not hold.
    /// One hop only: a peer-to-peer miss is terminal, never forwarded.
    async fn refuse_peer_lookup(
        &self,
        key: &str,
        request: &RequestMessage,
        connection: ConnectionId,
    ) -> Result<()> {
        info!(
            node = %self.id(),
            peer = %request.originator,
            resource = %key,
            "peer lookup missed, refusing without forwarding"
        );
        self.counters.record_bad_request();
        let reply = ReplyMessage::error(
            StatusCode::BAD_REQUEST,
            request.correlation_id,
            self.id().clone(),
        );
        self.transport.send_reply(connection, reply).await?;
        self.events
            .emit(NodeEvent::bad_request(
                self.id().as_str(),
                request.originator.as_str(),
                key,
            ))
            .await
    }

    /// Reject a request whose line yields no resource key.
    async fn reject_malformed(
        &self,
        request: RequestMessage,
        connection: ConnectionId,
        line: String,
    ) -> Result<()> {
        warn!(node = %self.id(), line = %line, "malformed request line");
        self.counters.record_bad_request();
        let reply = ReplyMessage::error(
            StatusCode::BAD_REQUEST,
            request.correlation_id,
            self.id().clone(),
        );
        self.transport.send_reply(connection, reply).await?;
        self.events
            .emit(NodeEvent::malformed_request(self.id().as_str(), line))
            .await
    }

    /// Start (or join) a resolution for a cache miss.
    async fn begin_resolution(
        &self,
        key: String,
        request: RequestMessage,
        connection: ConnectionId,
    ) -> Result<()> {
        self.events
            .emit(NodeEvent::cache_miss(self.id().as_str(), &key))
            .await?;

        let waiter = Waiter {
            connection,
            client_serial: request.correlation_id,
        };
        let (target, stage) = self.config.policy.initial();
        let deadline = Instant::now() + self.config.lookup_timeout;

        match self
            .pending
            .admit(key.clone(), request.clone(), waiter, stage, deadline)?
        {
            Admission::Coalesced { id, waiters } => {
                debug!(
                    node = %self.id(),
                    resource = %key,
                    correlation = %id,
                    waiters,
                    "joined outstanding lookup"
                );
                self.events
                    .emit(NodeEvent::lookup_coalesced(
                        self.id().as_str(),
                        &key,
                        id.0,
                        waiters,
                    ))
                    .await
            }
            Admission::New(id) => {
                let target_id = self.target_identity(target);
                let outbound = request
                    .with_correlation(id)
                    .with_originator(self.id().clone());
                info!(
                    node = %self.id(),
                    resource = %key,
                    target = %target_id,
                    correlation = %id,
                    "dispatching lookup"
                );
                self.transport.dispatch_lookup(target_id, outbound).await?;
                self.events
                    .emit(NodeEvent::lookup_dispatched(
                        self.id().as_str(),
                        &key,
                        target_id.as_str(),
                        id.0,
                    ))
                    .await
            }
        }
    }

    fn target_identity(&self, target: LookupTarget) -> &NodeId {
        match target {
            LookupTarget::Peer => &self.config.peer_id,
            LookupTarget::Origin => &self.config.origin_id,
        }
    }

    // =========================================================================
    // Inbound Reply
    // =========================================================================

    /// Handle a reply to a previously dispatched lookup.
    pub async fn handle_reply(&self, reply: ReplyMessage) -> Result<()> {
        let id = reply.correlation_id;
        match self.pending.settle(id, reply.status) {
            Err(Error::UnknownCorrelation(_)) => {
                // Duplicate or stale; discard without touching cache or wire.
                debug!(
                    node = %self.id(),
                    correlation = %id,
                    status = %reply.status,
                    "discarding reply with no pending request"
                );
                self.events
                    .emit(NodeEvent::reply_discarded(
                        self.id().as_str(),
                        id.0,
                        reply.status.0,
                    ))
                    .await
            }
            Err(e) => Err(e),
            Ok(SettleOutcome::Escalate { request }) => self.escalate_to_origin(id, request).await,
            Ok(SettleOutcome::Deliver { pending, cache }) => {
                self.deliver(reply, pending, cache).await
            }
        }
    }

    /// Peer miss: re-issue the original request against the origin under
    /// the same correlation id.
    async fn escalate_to_origin(&self, id: CorrelationId, request: RequestMessage) -> Result<()> {
        let key = request.resource_key()?;
        info!(
            node = %self.id(),
            resource = %key,
            correlation = %id,
            "peer missed, requesting from origin"
        );
        let outbound = request
            .with_correlation(id)
            .with_originator(self.id().clone());
        self.transport
            .dispatch_lookup(&self.config.origin_id, outbound)
            .await?;
        self.events
            .emit(NodeEvent::peer_miss_escalated(self.id().as_str(), &key, id.0))
            .await
    }

    /// Terminal resolution: fan the reply out to every waiter and, on
    /// success, insert the payload into the cache.
    async fn deliver(&self, reply: ReplyMessage, pending: PendingRequest, cache: bool) -> Result<()> {
        let key = pending.resource_key.as_str();

        if cache {
            let entry = CacheEntry::new(reply.payload.clone(), reply.content_type);
            let size = entry.size();
            let evicted = self.cache.put(key, entry);
            debug!(node = %self.id(), resource = %key, ?evicted, "caching resource");
            self.events
                .emit(NodeEvent::resource_cached(
                    self.id().as_str(),
                    key,
                    size,
                    evicted,
                ))
                .await?;
        } else {
            warn!(
                node = %self.id(),
                resource = %key,
                status = %reply.status,
                "origin failure, delivering without caching"
            );
            self.events
                .emit(NodeEvent::origin_failure(
                    self.id().as_str(),
                    key,
                    reply.status.0,
                ))
                .await?;
        }

        // Fan out to every coalesced waiter.
        futures::future::try_join_all(pending.waiters.iter().map(|waiter| {
            let delivered = reply.for_waiter(waiter.client_serial, self.id().clone());
            self.transport.send_reply(waiter.connection, delivered)
        }))
        .await?;

        self.events
            .emit(NodeEvent::resource_delivered(
                self.id().as_str(),
                key,
                reply.status.0,
                pending.waiters.len(),
            ))
            .await
    }

    // =========================================================================
    // Expiry
    // =========================================================================

    /// Retire every lookup whose deadline has passed, reporting failure to
    /// its waiters. Returns the number of retired lookups.
    pub async fn expire_overdue(&self, now: Instant) -> Result<usize> {
        let expired = self.pending.expire_overdue(now);
        for pending in &expired {
            warn!(
                node = %self.id(),
                resource = %pending.resource_key,
                correlation = %pending.correlation_id,
                stage = %pending.stage,
                "lookup expired, reporting failure upstream"
            );
            for waiter in &pending.waiters {
                let reply = ReplyMessage::error(
                    StatusCode::GATEWAY_TIMEOUT,
                    waiter.client_serial,
                    self.id().clone(),
                );
                self.transport.send_reply(waiter.connection, reply).await?;
            }
            self.events
                .emit(NodeEvent::lookup_expired(
                    self.id().as_str(),
                    &pending.resource_key,
                    pending.correlation_id.0,
                    pending.waiters.len(),
                ))
                .await?;
        }
        Ok(expired.len())
    }

    // =========================================================================
    // Event Loop
    // =========================================================================

    /// Drive the node from an inbox of inbound events until cancellation
    /// or inbox close. One event is fully processed before the next;
    /// overdue lookups are swept periodically.
    pub async fn run(
        self: Arc<Self>,
        mut inbox: mpsc::UnboundedReceiver<InboundEvent>,
        cancel: CancellationToken,
    ) {
        let sweep_period = (self.config.lookup_timeout / 4).max(std::time::Duration::from_millis(100));
        let mut sweep = tokio::time::interval(sweep_period);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(node = %self.id(), policy = ?self.config.policy, "edge node running");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sweep.tick() => {
                    if let Err(e) = self.expire_overdue(Instant::now()).await {
                        error!(node = %self.id(), error = %e, "expiry sweep failed");
                    }
                }
                event = inbox.recv() => match event {
                    Some(InboundEvent::Request { request, connection }) => {
                        if let Err(e) = self.handle_request(request, connection).await {
                            error!(node = %self.id(), error = %e, "request handling failed");
                        }
                    }
                    Some(InboundEvent::Reply(reply)) => {
                        if let Err(e) = self.handle_reply(reply).await {
                            error!(node = %self.id(), error = %e, "reply handling failed");
                        }
                    }
                    None => break,
                }
            }
        }
        info!(node = %self.id(), "edge node stopped");
    }
}

// =============================================================================
// Tests
// =============================================================================
