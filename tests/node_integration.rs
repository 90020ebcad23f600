//! EdgeCache Integration Tests
//!
//! End-to-end scenarios over the in-process loopback transport:
//! - Cooperative miss resolution (peer first, then origin)
//! - One-hop peer refusal
//! - Origin failure propagation
//! - Lookup expiry
//! - Service counters

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use edgecache::adapters::{LoggingEventSink, LoopbackNetwork};
use edgecache::cache::CacheEntry;
use edgecache::config::NodeConfig;
use edgecache::domain::ports::{CorrelationId, NodeId};
use edgecache::message::{ContentType, ReplyMessage, RequestMessage, StatusCode};
use edgecache::node::EdgeNode;
use edgecache::origin::OriginServer;

const CDN1: &str = "cdn1.example.org";
const CDN2: &str = "cdn2.example.org";
const ORIGIN: &str = "origin.example.org";

/// A full in-process topology: two cooperating edge nodes and one origin.
struct Topology {
    network: Arc<LoopbackNetwork>,
    cdn1: Arc<EdgeNode>,
    cdn2: Arc<EdgeNode>,
    origin: Arc<OriginServer>,
    cancel: CancellationToken,
}

impl Topology {
    fn start(strict_origin: bool) -> Self {
        Self::start_with_timeout(strict_origin, Duration::from_secs(10))
    }

    fn start_with_timeout(strict_origin: bool, lookup_timeout: Duration) -> Self {
        let network = Arc::new(LoopbackNetwork::new());
        let events = Arc::new(LoggingEventSink::debug_level());
        let cancel = CancellationToken::new();

        let origin = Arc::new(if strict_origin {
            OriginServer::strict(ORIGIN, network.clone() as _)
        } else {
            OriginServer::new(ORIGIN, network.clone() as _)
        });
        let origin_inbox = network.register(origin.id().clone());
        tokio::spawn(origin.clone().run(origin_inbox, cancel.clone()));

        let cdn1 = Self::spawn_node(CDN1, CDN2, &network, events.clone(), &cancel, lookup_timeout);
        let cdn2 = Self::spawn_node(CDN2, CDN1, &network, events, &cancel, lookup_timeout);

        Self {
            network,
            cdn1,
            cdn2,
            origin,
            cancel,
        }
    }

    fn spawn_node(
        id: &str,
        peer: &str,
        network: &Arc<LoopbackNetwork>,
        events: Arc<LoggingEventSink>,
        cancel: &CancellationToken,
        lookup_timeout: Duration,
    ) -> Arc<EdgeNode> {
        let config = NodeConfig::new(id, peer, ORIGIN)
            .with_capacity(NonZeroUsize::new(8).unwrap())
            .with_lookup_timeout(lookup_timeout);
        let node = Arc::new(EdgeNode::new(config, network.clone() as _, events).unwrap());
        let inbox = network.register(node.id().clone());
        tokio::spawn(node.clone().run(inbox, cancel.clone()));
        node
    }

    /// Issue one client request and wait for its reply.
    async fn request(&self, target: &NodeId, resource: &str, serial: u64) -> ReplyMessage {
        self.request_as(target, resource, serial, "client-test").await
    }

    /// Issue a request under an arbitrary originator identity.
    async fn request_as(
        &self,
        target: &NodeId,
        resource: &str,
        serial: u64,
        originator: &str,
    ) -> ReplyMessage {
        let (connection, mut replies) = self.network.open_client_connection();
        let request = RequestMessage::get(resource, NodeId::new(originator))
            .with_correlation(CorrelationId(serial));
        self.network
            .submit_request(target, request, connection)
            .unwrap();
        tokio::time::timeout(Duration::from_secs(2), replies.recv())
            .await
            .expect("timed out waiting for reply")
            .expect("reply channel closed")
    }
}

impl Drop for Topology {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// =============================================================================
// Cooperative Resolution
// =============================================================================

mod resolution_tests {
    use super::*;

    #[tokio::test]
    async fn test_miss_resolves_through_peer_and_origin() {
        let topo = Topology::start(false);

        let reply = topo.request(topo.cdn1.id(), "/x.html", 100).await;

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.payload.as_ref(), b"content of /x.html");
        assert_eq!(reply.content_type, ContentType::Html);
        assert_eq!(reply.correlation_id, CorrelationId(100));
        assert_eq!(reply.originator.as_str(), CDN1);

        // The peer missed and refused; the origin answered; cdn1 cached.
        assert!(topo.cdn1.cache().exists("x.html"));
        assert_eq!(topo.cdn1.pending_len(), 0);
        assert_eq!(topo.cdn2.counters().bad_requests(), 1);
    }

    #[tokio::test]
    async fn test_repeat_request_served_from_cache() {
        let topo = Topology::start(false);

        topo.request(topo.cdn1.id(), "/x.html", 100).await;
        let peer_refusals = topo.cdn2.counters().bad_requests();

        let reply = topo.request(topo.cdn1.id(), "/x.html", 101).await;

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.correlation_id, CorrelationId(101));
        assert_eq!(topo.cdn1.cache_stats().hits, 1);
        // No second peer lookup happened.
        assert_eq!(topo.cdn2.counters().bad_requests(), peer_refusals);
        assert_eq!(topo.cdn1.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_peer_serves_cached_content() {
        // Strict origin with nothing in it: only the peer can answer.
        let topo = Topology::start(true);
        topo.cdn2.cache().put(
            "warm.html",
            CacheEntry::new(Bytes::from_static(b"from-peer"), ContentType::Html),
        );

        let reply = topo.request(topo.cdn1.id(), "/warm.html", 200).await;

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.payload.as_ref(), b"from-peer");
        // The peer's answer is cached locally too.
        assert!(topo.cdn1.cache().exists("warm.html"));
        assert_eq!(topo.cdn2.counters().bad_requests(), 0);
    }

    #[tokio::test]
    async fn test_both_nodes_resolve_independently() {
        let topo = Topology::start(false);

        let reply1 = topo.request(topo.cdn1.id(), "/a.txt", 1).await;
        let reply2 = topo.request(topo.cdn2.id(), "/b.txt", 2).await;

        assert_eq!(reply1.status, StatusCode::OK);
        assert_eq!(reply2.status, StatusCode::OK);
        assert!(topo.cdn1.cache().exists("a.txt"));
        assert!(topo.cdn2.cache().exists("b.txt"));
    }

    #[tokio::test]
    async fn test_preloaded_origin_content_is_served_verbatim() {
        let topo = Topology::start(true);
        topo.origin.insert(
            "logo.png",
            Bytes::from_static(b"\x89PNG-data"),
            ContentType::Image,
        );

        let reply = topo.request(topo.cdn1.id(), "/logo.png", 7).await;

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.payload.as_ref(), b"\x89PNG-data");
        assert_eq!(reply.content_type, ContentType::Image);
    }
}

// =============================================================================
// One-Hop Refusal
// =============================================================================

mod peer_refusal_tests {
    use super::*;

    #[tokio::test]
    async fn test_peer_originated_miss_is_refused_not_forwarded() {
        let topo = Topology::start(false);

        // A lookup claiming to come from cdn2's configured peer, for a key
        // cdn2 does not hold, must be refused in the same handling step.
        let reply = topo
            .request_as(topo.cdn2.id(), "/nowhere.html", 9, CDN1)
            .await;

        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(topo.cdn2.counters().bad_requests(), 1);
        assert_eq!(topo.cdn2.pending_len(), 0);
        assert!(!topo.cdn2.cache().exists("nowhere.html"));
    }

    #[tokio::test]
    async fn test_peer_originated_hit_is_served() {
        let topo = Topology::start(true);
        topo.cdn2.cache().put(
            "have.html",
            CacheEntry::new(Bytes::from_static(b"yes"), ContentType::Html),
        );

        let reply = topo.request_as(topo.cdn2.id(), "/have.html", 10, CDN1).await;

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.payload.as_ref(), b"yes");
        assert_eq!(topo.cdn2.counters().bad_requests(), 0);
    }
}

// =============================================================================
// Failure Paths
// =============================================================================

mod failure_tests {
    use super::*;

    #[tokio::test]
    async fn test_origin_failure_propagates_and_is_not_cached() {
        let topo = Topology::start(true);

        let reply = topo.request(topo.cdn1.id(), "/ghost.html", 300).await;

        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        assert_eq!(reply.correlation_id, CorrelationId(300));
        assert!(!topo.cdn1.cache().exists("ghost.html"));
        assert_eq!(topo.cdn1.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_malformed_request_is_rejected() {
        let topo = Topology::start(false);

        let (connection, mut replies) = topo.network.open_client_connection();
        let mut request = RequestMessage::get("/x.html", NodeId::new("client-test"))
            .with_correlation(CorrelationId(11));
        request.request_line = "GET".to_string();
        topo.network
            .submit_request(topo.cdn1.id(), request, connection)
            .unwrap();

        let reply = tokio::time::timeout(Duration::from_secs(2), replies.recv())
            .await
            .expect("timed out")
            .expect("channel closed");
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(topo.cdn1.counters().bad_requests(), 1);
        assert_eq!(topo.cdn1.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_unanswered_lookup_expires_with_failure() {
        // Build a lone edge node whose peer and origin exist as inboxes
        // nobody drains, so dispatched lookups are never answered.
        let network = Arc::new(LoopbackNetwork::new());
        let events = Arc::new(LoggingEventSink::debug_level());
        let cancel = CancellationToken::new();
        let _peer_inbox = network.register(NodeId::new(CDN2));
        let _origin_inbox = network.register(NodeId::new(ORIGIN));

        let config = NodeConfig::new(CDN1, CDN2, ORIGIN)
            .with_lookup_timeout(Duration::from_millis(200));
        let node = Arc::new(EdgeNode::new(config, network.clone() as _, events).unwrap());
        let inbox = network.register(node.id().clone());
        tokio::spawn(node.clone().run(inbox, cancel.clone()));

        let (connection, mut replies) = network.open_client_connection();
        let request = RequestMessage::get("/slow.html", NodeId::new("client-test"))
            .with_correlation(CorrelationId(500));
        network
            .submit_request(node.id(), request, connection)
            .unwrap();

        let reply = tokio::time::timeout(Duration::from_secs(3), replies.recv())
            .await
            .expect("expiry reply never arrived")
            .expect("channel closed");

        assert_eq!(reply.status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(reply.correlation_id, CorrelationId(500));
        assert_eq!(node.pending_len(), 0);
        assert!(!node.cache().exists("slow.html"));

        cancel.cancel();
    }
}

// =============================================================================
// Counters
// =============================================================================

mod counter_tests {
    use super::*;

    #[tokio::test]
    async fn test_category_counters_track_served_resources() {
        let topo = Topology::start(false);

        topo.request(topo.cdn1.id(), "/a.html", 1).await;
        topo.request(topo.cdn1.id(), "/b.html", 2).await;
        topo.request(topo.cdn1.id(), "/c.txt", 3).await;
        topo.request(topo.cdn1.id(), "/d.png", 4).await;
        topo.request(topo.cdn1.id(), "/e.dat", 5).await;

        let snap = topo.cdn1.counters_snapshot();
        assert_eq!(snap.html_docs_served, 2);
        assert_eq!(snap.text_resources_served, 1);
        assert_eq!(snap.img_resources_served, 1);
        assert_eq!(snap.bad_requests, 0);
    }

    #[tokio::test]
    async fn test_peer_refusals_count_categories_too() {
        let topo = Topology::start(false);

        let reply = topo.request_as(topo.cdn2.id(), "/x.html", 6, CDN1).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);

        let snap = topo.cdn2.counters_snapshot();
        assert_eq!(snap.bad_requests, 1);
        assert_eq!(snap.html_docs_served, 1);
    }
}
