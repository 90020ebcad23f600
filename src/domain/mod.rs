//! Domain Layer
//!
//! Value objects, ports and events for the edge node. The resolution engine
//! depends only on the abstractions here; infrastructure adapters implement
//! them.

pub mod events;
pub mod ports;

pub use events::NodeEvent;
pub use ports::{ConnectionId, CorrelationId, EventSink, NodeId, Transport};
