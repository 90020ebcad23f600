//! Node Events
//!
//! Immutable records of significant occurrences in the resolution engine,
//! published through the [`EventSink`](super::ports::EventSink) port.
//! Counters, logs and test assertions all observe the node through these
//! instead of hooks inside the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event representing a significant occurrence at an edge node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeEvent {
    // =========================================================================
    // Cache Events
    // =========================================================================
    /// A request was served directly from the local cache.
    CacheHit {
        node: String,
        resource_key: String,
        timestamp: DateTime<Utc>,
    },

    /// A request missed the local cache.
    CacheMiss {
        node: String,
        resource_key: String,
        timestamp: DateTime<Utc>,
    },

    /// A resolved resource was inserted into the cache.
    ResourceCached {
        node: String,
        resource_key: String,
        size_bytes: u64,
        evicted: Option<String>,
        timestamp: DateTime<Utc>,
    },

    // =========================================================================
    // Resolution Events
    // =========================================================================
    /// An outbound lookup was dispatched toward a peer or the origin.
    LookupDispatched {
        node: String,
        resource_key: String,
        target: String,
        correlation_id: u64,
        timestamp: DateTime<Utc>,
    },

    /// A request joined an already-outstanding lookup for the same key.
    LookupCoalesced {
        node: String,
        resource_key: String,
        correlation_id: u64,
        waiters: usize,
        timestamp: DateTime<Utc>,
    },

    /// A peer miss escalated the lookup to the origin.
    PeerMissEscalated {
        node: String,
        resource_key: String,
        correlation_id: u64,
        timestamp: DateTime<Utc>,
    },

    /// A resolved reply was delivered to the original requesters.
    ResourceDelivered {
        node: String,
        resource_key: String,
        status: u16,
        waiters: usize,
        timestamp: DateTime<Utc>,
    },

    /// The origin answered with a failure; delivered but not cached.
    OriginFailure {
        node: String,
        resource_key: String,
        status: u16,
        timestamp: DateTime<Utc>,
    },

    /// An outstanding lookup exceeded its deadline and was retired.
    LookupExpired {
        node: String,
        resource_key: String,
        correlation_id: u64,
        waiters: usize,
        timestamp: DateTime<Utc>,
    },

    // =========================================================================
    // Rejection Events
    // =========================================================================
    /// A peer-originated lookup missed the cache and was refused.
    BadRequest {
        node: String,
        originator: String,
        resource_key: String,
        timestamp: DateTime<Utc>,
    },

    /// A request line yielded no resource key.
    MalformedRequest {
        node: String,
        request_line: String,
        timestamp: DateTime<Utc>,
    },

    /// A reply arrived for an unknown or already-retired correlation id.
    ReplyDiscarded {
        node: String,
        correlation_id: u64,
        status: u16,
        timestamp: DateTime<Utc>,
    },
}

impl NodeEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            NodeEvent::CacheHit { timestamp, .. } => *timestamp,
            NodeEvent::CacheMiss { timestamp, .. } => *timestamp,
            NodeEvent::ResourceCached { timestamp, .. } => *timestamp,
            NodeEvent::LookupDispatched { timestamp, .. } => *timestamp,
            NodeEvent::LookupCoalesced { timestamp, .. } => *timestamp,
            NodeEvent::PeerMissEscalated { timestamp, .. } => *timestamp,
            NodeEvent::ResourceDelivered { timestamp, .. } => *timestamp,
            NodeEvent::OriginFailure { timestamp, .. } => *timestamp,
            NodeEvent::LookupExpired { timestamp, .. } => *timestamp,
            NodeEvent::BadRequest { timestamp, .. } => *timestamp,
            NodeEvent::MalformedRequest { timestamp, .. } => *timestamp,
            NodeEvent::ReplyDiscarded { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            NodeEvent::CacheHit { .. } => "CacheHit",
            NodeEvent::CacheMiss { .. } => "CacheMiss",
            NodeEvent::ResourceCached { .. } => "ResourceCached",
            NodeEvent::LookupDispatched { .. } => "LookupDispatched",
            NodeEvent::LookupCoalesced { .. } => "LookupCoalesced",
            NodeEvent::PeerMissEscalated { .. } => "PeerMissEscalated",
            NodeEvent::ResourceDelivered { .. } => "ResourceDelivered",
            NodeEvent::OriginFailure { .. } => "OriginFailure",
            NodeEvent::LookupExpired { .. } => "LookupExpired",
            NodeEvent::BadRequest { .. } => "BadRequest",
            NodeEvent::MalformedRequest { .. } => "MalformedRequest",
            NodeEvent::ReplyDiscarded { .. } => "ReplyDiscarded",
        }
    }

    /// Get the resource key if the event carries one.
    pub fn resource_key(&self) -> Option<&str> {
        match self {
            NodeEvent::CacheHit { resource_key, .. } => Some(resource_key),
            NodeEvent::CacheMiss { resource_key, .. } => Some(resource_key),
            NodeEvent::ResourceCached { resource_key, .. } => Some(resource_key),
            NodeEvent::LookupDispatched { resource_key, .. } => Some(resource_key),
            NodeEvent::LookupCoalesced { resource_key, .. } => Some(resource_key),
            NodeEvent::PeerMissEscalated { resource_key, .. } => Some(resource_key),
            NodeEvent::ResourceDelivered { resource_key, .. } => Some(resource_key),
            NodeEvent::OriginFailure { resource_key, .. } => Some(resource_key),
            NodeEvent::LookupExpired { resource_key, .. } => Some(resource_key),
            NodeEvent::BadRequest { resource_key, .. } => Some(resource_key),
            _ => None,
        }
    }
}

// =============================================================================
// Event Builders
// =============================================================================

impl NodeEvent {
    /// Create a CacheHit event.
    pub fn cache_hit(node: impl Into<String>, resource_key: impl Into<String>) -> Self {
        NodeEvent::CacheHit {
            node: node.into(),
            resource_key: resource_key.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a CacheMiss event.
    pub fn cache_miss(node: impl Into<String>, resource_key: impl Into<String>) -> Self {
        NodeEvent::CacheMiss {
            node: node.into(),
            resource_key: resource_key.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a ResourceCached event.
    pub fn resource_cached(
        node: impl Into<String>,
        resource_key: impl Into<String>,
        size_bytes: u64,
        evicted: Option<String>,
    ) -> Self {
        NodeEvent::ResourceCached {
            node: node.into(),
            resource_key: resource_key.into(),
            size_bytes,
            evicted,
            timestamp: Utc::now(),
        }
    }

    /// Create a LookupDispatched event.
    pub fn lookup_dispatched(
        node: impl Into<String>,
        resource_key: impl Into<String>,
        target: impl Into<String>,
        correlation_id: u64,
    ) -> Self {
        NodeEvent::LookupDispatched {
            node: node.into(),
            resource_key: resource_key.into(),
            target: target.into(),
            correlation_id,
            timestamp: Utc::now(),
        }
    }

    /// Create a LookupCoalesced event.
    pub fn lookup_coalesced(
        node: impl Into<String>,
        resource_key: impl Into<String>,
        correlation_id: u64,
        waiters: usize,
    ) -> Self {
        NodeEvent::LookupCoalesced {
            node: node.into(),
            resource_key: resource_key.into(),
            correlation_id,
            waiters,
            timestamp: Utc::now(),
        }
    }

    /// Create a PeerMissEscalated event.
    pub fn peer_miss_escalated(
        node: impl Into<String>,
        resource_key: impl Into<String>,
        correlation_id: u64,
    ) -> Self {
        NodeEvent::PeerMissEscalated {
            node: node.into(),
            resource_key: resource_key.into(),
            correlation_id,
            timestamp: Utc::now(),
        }
    }

    /// Create a ResourceDelivered event.
    pub fn resource_delivered(
        node: impl Into<String>,
        resource_key: impl Into<String>,
        status: u16,
        waiters: usize,
    ) -> Self {
        NodeEvent::ResourceDelivered {
            node: node.into(),
            resource_key: resource_key.into(),
            status,
            waiters,
            timestamp: Utc::now(),
        }
    }

    /// Create an OriginFailure event.
    pub fn origin_failure(
        node: impl Into<String>,
        resource_key: impl Into<String>,
        status: u16,
    ) -> Self {
        NodeEvent::OriginFailure {
            node: node.into(),
            resource_key: resource_key.into(),
            status,
            timestamp: Utc::now(),
        }
    }

    /// Create a LookupExpired event.
    pub fn lookup_expired(
        node: impl Into<String>,
        resource_key: impl Into<String>,
        correlation_id: u64,
        waiters: usize,
    ) -> Self {
        NodeEvent::LookupExpired {
            node: node.into(),
            resource_key: resource_key.into(),
            correlation_id,
            waiters,
            timestamp: Utc::now(),
        }
    }

    /// Create a BadRequest event.
    pub fn bad_request(
        node: impl Into<String>,
        originator: impl Into<String>,
        resource_key: impl Into<String>,
    ) -> Self {
        NodeEvent::BadRequest {
            node: node.into(),
            originator: originator.into(),
            resource_key: resource_key.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a MalformedRequest event.
    pub fn malformed_request(node: impl Into<String>, request_line: impl Into<String>) -> Self {
        NodeEvent::MalformedRequest {
            node: node.into(),
            request_line: request_line.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a ReplyDiscarded event.
    pub fn reply_discarded(node: impl Into<String>, correlation_id: u64, status: u16) -> Self {
        NodeEvent::ReplyDiscarded {
            node: node.into(),
            correlation_id,
            status,
            timestamp: Utc::now(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
