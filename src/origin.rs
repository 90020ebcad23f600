//! Origin Server
//!
//! The authoritative upstream in the topology. Serves any requested key,
//! synthesizing content on first demand, so edge nodes can treat it as the
//! last resort after a peer miss. A strict mode disables synthesis and
//! answers 404 for unknown keys, which lets tests and demos exercise the
//! origin-failure path.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::ports::{ConnectionId, NodeId, Transport};
use crate::error::{Error, Result};
use crate::message::{ContentType, InboundEvent, ReplyMessage, RequestMessage, StatusCode};

/// Authoritative content source.
pub struct OriginServer {
    node_id: NodeId,
    transport: Arc<dyn Transport>,
    catalog: RwLock<HashMap<String, (Bytes, ContentType)>>,
    synthesize_missing: bool,
}

impl OriginServer {
    /// Create an origin that synthesizes content for unknown keys.
    pub fn new(node_id: impl Into<NodeId>, transport: Arc<dyn Transport>) -> Self {
        Self {
            node_id: node_id.into(),
            transport,
            catalog: RwLock::new(HashMap::new()),
            synthesize_missing: true,
        }
    }

    /// Create an origin that serves only its catalog, answering 404
    /// for anything else.
    pub fn strict(node_id: impl Into<NodeId>, transport: Arc<dyn Transport>) -> Self {
        Self {
            node_id: node_id.into(),
            transport,
            catalog: RwLock::new(HashMap::new()),
            synthesize_missing: false,
        }
    }

    /// This origin's identity.
    pub fn id(&self) -> &NodeId {
        &self.node_id
    }

    /// Preload a resource into the catalog.
    pub fn insert(&self, key: impl Into<String>, payload: Bytes, content_type: ContentType) {
        self.catalog.write().insert(key.into(), (payload, content_type));
    }

    /// Handle one inbound lookup.
    pub async fn handle_request(
        &self,
        request: RequestMessage,
        connection: ConnectionId,
    ) -> Result<()> {
        let key = match request.resource_key() {
            Ok(key) => key,
            Err(Error::MalformedRequest(line)) => {
                warn!(node = %self.node_id, line = %line, "malformed lookup at origin");
                let reply = ReplyMessage::error(
                    StatusCode::BAD_REQUEST,
                    request.correlation_id,
                    self.node_id.clone(),
                );
                return self.transport.send_reply(connection, reply).await;
            }
            Err(e) => return Err(e),
        };

        let cached = self.catalog.read().get(&key).cloned();
        if let Some((payload, content_type)) = cached {
            debug!(node = %self.node_id, resource = %key, "serving from catalog");
            let reply = ReplyMessage::ok(
                payload,
                content_type,
                request.correlation_id,
                self.node_id.clone(),
            );
            return self.transport.send_reply(connection, reply).await;
        }

        if self.synthesize_missing {
            let payload = Bytes::from(format!("content of /{key}"));
            let content_type = ContentType::from_key(&key);
            self.catalog
                .write()
                .insert(key.clone(), (payload.clone(), content_type));
            debug!(node = %self.node_id, resource = %key, "synthesizing content");
            let reply = ReplyMessage::ok(
                payload,
                content_type,
                request.correlation_id,
                self.node_id.clone(),
            );
            return self.transport.send_reply(connection, reply).await;
        }

        info!(node = %self.node_id, resource = %key, "resource unknown at origin");
        let reply = ReplyMessage::error(
            StatusCode::NOT_FOUND,
            request.correlation_id,
            self.node_id.clone(),
        );
        self.transport.send_reply(connection, reply).await
    }

    /// Drive the origin from its inbox until cancellation or inbox close.
    pub async fn run(
        self: Arc<Self>,
        mut inbox: mpsc::UnboundedReceiver<InboundEvent>,
        cancel: CancellationToken,
    ) {
        info!(node = %self.node_id, "origin server running");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = inbox.recv() => match event {
                    Some(InboundEvent::Request { request, connection }) => {
                        if let Err(e) = self.handle_request(request, connection).await {
                            error!(node = %self.node_id, error = %e, "lookup handling failed");
                        }
                    }
                    Some(InboundEvent::Reply(reply)) => {
                        // The origin dispatches no lookups of its own.
                        warn!(
                            node = %self.node_id,
                            correlation = %reply.correlation_id,
                            "origin received an unexpected reply, ignoring"
                        );
                    }
                    None => break,
                }
            }
        }
        info!(node = %self.node_id, "origin server stopped");
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::recording::RecordingTransport;
    use crate::domain::ports::CorrelationId;

    fn lookup(resource: &str, serial: u64) -> RequestMessage {
        RequestMessage::get(resource, NodeId::new("cdn1.example.org"))
            .with_correlation(CorrelationId(serial))
    }

    #[tokio::test]
    async fn test_synthesizes_unknown_content() {
        let transport = Arc::new(RecordingTransport::new());
        let origin = OriginServer::new("origin.example.org", transport.clone());

        origin
            .handle_request(lookup("/x.html", 7), ConnectionId(1))
            .await
            .unwrap();

        let sent = transport.sent_replies();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].reply.status, StatusCode::OK);
        assert_eq!(sent[0].reply.payload.as_ref(), b"content of /x.html");
        assert_eq!(sent[0].reply.content_type, ContentType::Html);
        assert_eq!(sent[0].reply.correlation_id, CorrelationId(7));
    }

    #[tokio::test]
    async fn test_serves_catalog_content() {
        let transport = Arc::new(RecordingTransport::new());
        let origin = OriginServer::new("origin.example.org", transport.clone());
        origin.insert("logo.png", Bytes::from_static(b"\x89PNG"), ContentType::Image);

        origin
            .handle_request(lookup("/logo.png", 8), ConnectionId(1))
            .await
            .unwrap();

        let sent = transport.sent_replies();
        assert_eq!(sent[0].reply.payload.as_ref(), b"\x89PNG");
        assert_eq!(sent[0].reply.content_type, ContentType::Image);
    }

    #[tokio::test]
    async fn test_strict_origin_answers_not_found() {
        let transport = Arc::new(RecordingTransport::new());
        let origin = OriginServer::strict("origin.example.org", transport.clone());

        origin
            .handle_request(lookup("/ghost.html", 9), ConnectionId(1))
            .await
            .unwrap();

        let sent = transport.sent_replies();
        assert_eq!(sent[0].reply.status, StatusCode::NOT_FOUND);
        assert!(sent[0].reply.payload.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_lookup_rejected() {
        let transport = Arc::new(RecordingTransport::new());
        let origin = OriginServer::new("origin.example.org", transport.clone());

        let mut request = lookup("/x.html", 10);
        request.request_line = "GET".to_string();
        origin
            .handle_request(request, ConnectionId(1))
            .await
            .unwrap();

        assert_eq!(
            transport.sent_replies()[0].reply.status,
            StatusCode::BAD_REQUEST
        );
    }
}
