//! EdgeCache - Cooperative Caching Edge Node
//!
//! A content-delivery edge node: resource requests are served from a local
//! LRU cache, and on a miss the node cooperatively queries its peer edge
//! node before falling back to the authoritative origin. Successful
//! resolutions are cached and fanned out to every waiting requester.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                          EdgeNode                               │
//! ├────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐        │
//! │  │   LruCache   │   │ PendingTable │   │  resolution  │        │
//! │  │   (store)    │   │ (correlate)  │   │   (decide)   │        │
//! │  └──────────────┘   └──────────────┘   └──────────────┘        │
//! │          │                  │                  │                │
//! │          └──────────────────┴──────────────────┘                │
//! │                             │                                   │
//! │                  Transport / EventSink ports                    │
//! └────────────────────────────────────────────────────────────────┘
//!         hit → reply        miss → peer → (miss) → origin
//! ```
//!
//! The topology is two edge nodes, each configured with the other as its
//! fixed peer, plus one origin. A peer that misses on a lookup from the
//! other peer refuses it instead of forwarding further, so a lookup never
//! travels more than one hop before the origin.
//!
//! # Modules
//!
//! - [`adapters`] - Infrastructure adapters implementing domain ports
//! - [`cache`] - Bounded LRU resource cache
//! - [`config`] - Node configuration and validation
//! - [`domain`] - Ports, value objects and events
//! - [`error`] - Error types
//! - [`message`] - Request/reply message shapes
//! - [`metrics`] - Prometheus metrics exposition
//! - [`node`] - The resolution engine and facade
//! - [`origin`] - Authoritative origin server

pub mod adapters;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod message;
pub mod metrics;
pub mod node;
pub mod origin;

// Re-export commonly used types
pub use cache::{CacheEntry, CacheStats, LruCache};
pub use config::NodeConfig;
pub use domain::{ConnectionId, CorrelationId, EventSink, NodeEvent, NodeId, Transport};
pub use error::{Error, Result};
pub use message::{ContentType, InboundEvent, ReplyMessage, RequestMessage, StatusCode};
pub use node::{EdgeNode, ResolutionPolicy};
pub use origin::OriginServer;
