//! Domain Ports (Port/Adapter Pattern)
//!
//! Core abstractions the node depends on. Infrastructure adapters implement
//! these traits, so the resolution engine never addresses the transport or
//! the instrumentation backend directly — it holds injected handles.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Domain Layer                            │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                  Ports (Traits)                      │    │
//! │  │        Transport         │        EventSink          │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                 Adapters (Impls)                     │    │
//! │  │  LoopbackTransport │ RecordingTransport │ EventSinks │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;

use crate::domain::events::NodeEvent;
use crate::error::Result;
use crate::message::{ReplyMessage, RequestMessage};

// =============================================================================
// Value Objects
// =============================================================================

/// Identity of a node in the topology (value object).
///
/// Edge nodes, the origin and clients are all addressed by identity; the
/// two-node peer topology is expressed purely through configured identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Correlation id linking an outbound lookup to the inbound request that
/// caused it (value object). Unique among outstanding requests at a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(pub u64);

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle back to a requester's connection (value object).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Transport Port
// =============================================================================

/// Port for the request/reply message transport.
///
/// Framing, socket lifecycle and routing live behind this trait. Outbound
/// lookups are fire-and-forget: the matching reply arrives later through the
/// node's inbox as an [`crate::message::InboundEvent::Reply`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a reply back on the given connection.
    async fn send_reply(&self, connection: ConnectionId, reply: ReplyMessage) -> Result<()>;

    /// Close a connection.
    async fn close_connection(&self, connection: ConnectionId) -> Result<()>;

    /// Send an outbound lookup toward a named node.
    async fn dispatch_lookup(&self, target: &NodeId, request: RequestMessage) -> Result<()>;
}

// =============================================================================
// Event Sink Port
// =============================================================================

/// Port for publishing node events.
///
/// Instrumentation is a cross-cutting observer attached here, not baked into
/// the resolution engine.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Publish a node event.
    async fn emit(&self, event: NodeEvent) -> Result<()>;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id() {
        let id = NodeId::new("cdn1.example.org");
        assert_eq!(id.as_str(), "cdn1.example.org");
        assert_eq!(id.to_string(), "cdn1.example.org");
        assert_eq!(id, NodeId::from("cdn1.example.org"));
    }

    #[test]
    fn test_correlation_id_display() {
        assert_eq!(CorrelationId(42).to_string(), "42");
    }

    #[test]
    fn test_connection_id_hashable() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(ConnectionId(1));
        set.insert(ConnectionId(1));
        set.insert(ConnectionId(2));
        assert_eq!(set.len(), 2);
    }
}
