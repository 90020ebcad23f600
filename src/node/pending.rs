//! Pending-Request Table
//!
//! Correlates an in-flight outbound lookup (to the peer or the origin) back
//! to the inbound requests that caused it.
//!
//! # Invariants
//!
//! - At most one record per correlation id; a record is retired exactly
//!   once, on delivery or expiry.
//! - Concurrent misses on one resource key coalesce into a single
//!   outstanding lookup; every requester is kept as a waiter and served on
//!   completion.
//! - All mutations for one correlation id happen under the table mutex in
//!   a single critical section ([`PendingTable::admit`],
//!   [`PendingTable::settle`], [`PendingTable::expire_overdue`]), so a
//!   stale or duplicate reply can never interleave with a live one.
//!
//! Correlation ids come from a strictly monotonic per-node counter, unique
//! for the node's lifetime, so two unrelated resolutions can never share a
//! record.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

use super::resolution::{self, ReplyDisposition, ResolutionStage};
use crate::domain::ports::{ConnectionId, CorrelationId};
use crate::error::{Error, Result};
use crate::message::{RequestMessage, StatusCode};

/// One original requester waiting on a resolution.
#[derive(Debug, Clone)]
pub struct Waiter {
    /// Handle back to the requester's connection
    pub connection: ConnectionId,
    /// The correlation id the requester used, echoed back on delivery
    pub client_serial: CorrelationId,
}

/// State carried for one outstanding resolution.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub correlation_id: CorrelationId,
    pub resource_key: String,
    /// Owned copy of the inbound request, kept for re-issue on escalation
    pub request: RequestMessage,
    pub waiters: Vec<Waiter>,
    pub stage: ResolutionStage,
    pub deadline: Instant,
}

/// Result of admitting a cache miss.
#[derive(Debug)]
pub enum Admission {
    /// A fresh lookup must be dispatched under this correlation id.
    New(CorrelationId),
    /// The requester joined an already-outstanding lookup.
    Coalesced {
        id: CorrelationId,
        waiters: usize,
    },
}

/// Result of settling a reply.
#[derive(Debug)]
pub enum SettleOutcome {
    /// Peer miss: the stage advanced to the origin in place and the
    /// original request is returned for re-dispatch. The record stays.
    Escalate { request: RequestMessage },
    /// Terminal: the record is retired and returned for delivery fan-out.
    /// `cache` is false when the reply is an origin failure.
    Deliver {
        pending: PendingRequest,
        cache: bool,
    },
}

struct PendingInner {
    by_id: HashMap<u64, PendingRequest>,
    /// resource key → correlation id of the one outstanding lookup for it
    by_key: HashMap<String, u64>,
}

/// Table of outstanding resolutions for one edge node.
pub struct PendingTable {
    inner: Mutex<PendingInner>,
    next_id: AtomicU64,
}

impl Default for PendingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PendingInner {
                by_id: HashMap::new(),
                by_key: HashMap::new(),
            }),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_correlation_id(&self) -> CorrelationId {
        CorrelationId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Admit a cache miss: join the outstanding lookup for this key, or
    /// create a new record under a fresh correlation id.
    ///
    /// A correlation id collision on insert is a programming-error
    /// condition, surfaced as [`Error::DuplicateCorrelation`].
    pub fn admit(
        &self,
        resource_key: impl Into<String>,
        request: RequestMessage,
        waiter: Waiter,
        stage: ResolutionStage,
        deadline: Instant,
    ) -> Result<Admission> {
        let resource_key = resource_key.into();
        let mut inner = self.inner.lock();

        if let Some(&id) = inner.by_key.get(&resource_key) {
            if let Some(pending) = inner.by_id.get_mut(&id) {
                pending.waiters.push(waiter);
                return Ok(Admission::Coalesced {
                    id: CorrelationId(id),
                    waiters: pending.waiters.len(),
                });
            }
            // Stale index entry; fall through and replace it.
            inner.by_key.remove(&resource_key);
        }

        let id = self.next_correlation_id();
        if inner.by_id.contains_key(&id.0) {
            return Err(Error::DuplicateCorrelation(id.0));
        }
        inner.by_key.insert(resource_key.clone(), id.0);
        inner.by_id.insert(
            id.0,
            PendingRequest {
                correlation_id: id,
                resource_key,
                request,
                waiters: vec![waiter],
                stage,
                deadline,
            },
        );
        Ok(Admission::New(id))
    }

    /// Apply the resolution state machine to a reply, atomically.
    ///
    /// Fails with [`Error::UnknownCorrelation`] for a retired or
    /// never-issued id; the facade treats that as a stale reply and
    /// discards it.
    pub fn settle(&self, id: CorrelationId, status: StatusCode) -> Result<SettleOutcome> {
        let mut inner = self.inner.lock();
        let stage = inner
            .by_id
            .get(&id.0)
            .map(|p| p.stage)
            .ok_or(Error::UnknownCorrelation(id.0))?;

        match resolution::on_reply(stage, status) {
            ReplyDisposition::Escalate => {
                let pending = inner
                    .by_id
                    .get_mut(&id.0)
                    .ok_or(Error::UnknownCorrelation(id.0))?;
                pending.stage = ResolutionStage::QueryingOrigin;
                Ok(SettleOutcome::Escalate {
                    request: pending.request.clone(),
                })
            }
            ReplyDisposition::Deliver { cache } => {
                let pending = inner
                    .by_id
                    .remove(&id.0)
                    .ok_or(Error::UnknownCorrelation(id.0))?;
                inner.by_key.remove(&pending.resource_key);
                Ok(SettleOutcome::Deliver { pending, cache })
            }
        }
    }

    /// Remove and return every record whose deadline has passed.
    pub fn expire_overdue(&self, now: Instant) -> Vec<PendingRequest> {
        let mut inner = self.inner.lock();
        let overdue: Vec<u64> = inner
            .by_id
            .values()
            .filter(|p| p.deadline <= now)
            .map(|p| p.correlation_id.0)
            .collect();

        let mut expired = Vec::with_capacity(overdue.len());
        for id in overdue {
            if let Some(pending) = inner.by_id.remove(&id) {
                inner.by_key.remove(&pending.resource_key);
                expired.push(pending);
            }
        }
        expired
    }

    /// Stage of an outstanding resolution, for inspection.
    pub fn stage(&self, id: CorrelationId) -> Result<ResolutionStage> {
        self.inner
            .lock()
            .by_id
            .get(&id.0)
            .map(|p| p.stage)
            .ok_or(Error::UnknownCorrelation(id.0))
    }

    /// Correlation id of the outstanding lookup for a key, if any.
    pub fn outstanding_for(&self, resource_key: &str) -> Option<CorrelationId> {
        self.inner
            .lock()
            .by_key
            .get(resource_key)
            .map(|&id| CorrelationId(id))
    }

    /// Number of outstanding resolutions.
    pub fn len(&self) -> usize {
        self.inner.lock().by_id.len()
    }

    /// Check if no resolutions are outstanding.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().by_id.is_empty()
    }

    #[cfg(test)]
    fn rewind_ids(&self, to: u64) {
        self.next_id.store(to, Ordering::Relaxed);
    }
}

// =============================================================================
// Tests
// =============================================================================
