//! Node Configuration
//!
//! Identities, cache capacity, lookup deadline and resolution policy for one
//! edge node. Loaded at startup and validated before anything is built;
//! configuration errors are the only fatal ones.

use std::num::NonZeroUsize;
use std::time::Duration;

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::domain::ports::NodeId;
use crate::error::{Error, Result};
use crate::node::ResolutionPolicy;

/// Default bound on how long a lookup may stay outstanding.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for one edge node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// This node's own identity
    pub node_id: NodeId,
    /// The fixed peer queried first on a miss
    pub peer_id: NodeId,
    /// The authoritative origin
    pub origin_id: NodeId,
    /// Cache capacity in entries
    pub cache_capacity: NonZeroUsize,
    /// Deadline for an outstanding lookup before it is retired with a
    /// failure to the requesters
    pub lookup_timeout: Duration,
    /// Miss resolution policy
    pub policy: ResolutionPolicy,
}

impl NodeConfig {
    /// Build a configuration with default capacity, timeout and the
    /// cooperative peer-then-origin policy.
    pub fn new(
        node_id: impl Into<NodeId>,
        peer_id: impl Into<NodeId>,
        origin_id: impl Into<NodeId>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            peer_id: peer_id.into(),
            origin_id: origin_id.into(),
            cache_capacity: NonZeroUsize::new(DEFAULT_CACHE_CAPACITY)
                .expect("default capacity is non-zero"),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            policy: ResolutionPolicy::PeerThenOrigin,
        }
    }

    /// Set the cache capacity.
    pub fn with_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Set the lookup timeout.
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Set the resolution policy.
    pub fn with_policy(mut self, policy: ResolutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Validate identities and limits. Fatal at startup on failure.
    pub fn validate(&self) -> Result<()> {
        if self.node_id.as_str().is_empty() {
            return Err(Error::Config("node identity must not be empty".into()));
        }
        if self.origin_id.as_str().is_empty() {
            return Err(Error::Config("origin identity must not be empty".into()));
        }
        if self.node_id == self.origin_id {
            return Err(Error::Config(format!(
                "node and origin identities must differ (both {})",
                self.node_id
            )));
        }
        if self.policy == ResolutionPolicy::PeerThenOrigin {
            if self.peer_id.as_str().is_empty() {
                return Err(Error::Config(
                    "peer identity must not be empty under peer-then-origin".into(),
                ));
            }
            if self.peer_id == self.node_id {
                return Err(Error::Config(format!(
                    "node cannot be its own peer ({})",
                    self.node_id
                )));
            }
        }
        if self.lookup_timeout.is_zero() {
            return Err(Error::Config("lookup timeout must be positive".into()));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
