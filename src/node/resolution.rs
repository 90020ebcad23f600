//! Resolution State Machine
//!
//! Pure decision logic for where a cache miss goes next and what to do with
//! the reply. The table in [`super::pending`] applies these decisions
//! atomically; all I/O stays in the facade.
//!
//! States: cached (terminal, implicit — a hit never enters the machine),
//! querying the peer, querying the origin. A peer miss escalates to the
//! origin reusing the same correlation id; an origin failure is delivered
//! to the requesters but never cached.

use std::str::FromStr;

use crate::error::Error;
use crate::message::StatusCode;

/// How this node resolves a cache miss.
///
/// One node type covers both roles in the topology: the cooperative edge
/// (peer first, then origin) and the plain pass-through client that only
/// talks to the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionPolicy {
    /// Query the configured peer first, the origin on a peer miss.
    PeerThenOrigin,
    /// Query the origin directly.
    OriginOnly,
}

impl ResolutionPolicy {
    /// Initial lookup target and stage for a fresh miss.
    pub fn initial(&self) -> (LookupTarget, ResolutionStage) {
        match self {
            ResolutionPolicy::PeerThenOrigin => {
                (LookupTarget::Peer, ResolutionStage::QueryingPeer)
            }
            ResolutionPolicy::OriginOnly => {
                (LookupTarget::Origin, ResolutionStage::QueryingOrigin)
            }
        }
    }
}

impl FromStr for ResolutionPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "peer-then-origin" => Ok(ResolutionPolicy::PeerThenOrigin),
            "origin-only" => Ok(ResolutionPolicy::OriginOnly),
            other => Err(Error::Config(format!(
                "unknown resolution policy {other:?} (expected peer-then-origin or origin-only)"
            ))),
        }
    }
}

/// Where an outbound lookup is headed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupTarget {
    Peer,
    Origin,
}

/// Stage of an in-flight resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStage {
    QueryingPeer,
    QueryingOrigin,
}

impl std::fmt::Display for ResolutionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionStage::QueryingPeer => write!(f, "querying-peer"),
            ResolutionStage::QueryingOrigin => write!(f, "querying-origin"),
        }
    }
}

/// What to do with a reply for an in-flight resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyDisposition {
    /// Forward the reply to the original requesters; insert into the
    /// cache only when `cache` is set.
    Deliver { cache: bool },
    /// Re-issue the lookup against the origin, same correlation id.
    Escalate,
}

/// Decide the disposition of a reply received in the given stage.
///
/// Success from either target terminates the resolution and caches the
/// payload. A peer failure escalates; an origin failure terminates without
/// a cache insert (the origin is authoritative, its failure is the answer).
pub fn on_reply(stage: ResolutionStage, status: StatusCode) -> ReplyDisposition {
    match (stage, status.is_success()) {
        (_, true) => ReplyDisposition::Deliver { cache: true },
        (ResolutionStage::QueryingPeer, false) => ReplyDisposition::Escalate,
        (ResolutionStage::QueryingOrigin, false) => ReplyDisposition::Deliver { cache: false },
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_target_per_policy() {
        assert_eq!(
            ResolutionPolicy::PeerThenOrigin.initial(),
            (LookupTarget::Peer, ResolutionStage::QueryingPeer)
        );
        assert_eq!(
            ResolutionPolicy::OriginOnly.initial(),
            (LookupTarget::Origin, ResolutionStage::QueryingOrigin)
        );
    }

    #[test]
    fn test_peer_success_delivers_and_caches() {
        assert_eq!(
            on_reply(ResolutionStage::QueryingPeer, StatusCode::OK),
            ReplyDisposition::Deliver { cache: true }
        );
    }

    #[test]
    fn test_peer_miss_escalates() {
        assert_eq!(
            on_reply(ResolutionStage::QueryingPeer, StatusCode::NOT_FOUND),
            ReplyDisposition::Escalate
        );
        assert_eq!(
            on_reply(ResolutionStage::QueryingPeer, StatusCode::BAD_REQUEST),
            ReplyDisposition::Escalate
        );
    }

    #[test]
    fn test_origin_success_delivers_and_caches() {
        assert_eq!(
            on_reply(ResolutionStage::QueryingOrigin, StatusCode::OK),
            ReplyDisposition::Deliver { cache: true }
        );
    }

    #[test]
    fn test_origin_failure_delivers_without_caching() {
        assert_eq!(
            on_reply(ResolutionStage::QueryingOrigin, StatusCode::NOT_FOUND),
            ReplyDisposition::Deliver { cache: false }
        );
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "peer-then-origin".parse::<ResolutionPolicy>().unwrap(),
            ResolutionPolicy::PeerThenOrigin
        );
        assert_eq!(
            "origin-only".parse::<ResolutionPolicy>().unwrap(),
            ResolutionPolicy::OriginOnly
        );
        assert!("cdn".parse::<ResolutionPolicy>().is_err());
    }
}
