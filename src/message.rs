//! Request/Reply Message Types
//!
//! Wire-facing message shapes exchanged between clients, edge nodes and the
//! origin. Transport framing is out of scope; these are the already-decoded
//! forms the node consumes and produces.

use bytes::Bytes;

use crate::domain::ports::{ConnectionId, CorrelationId, NodeId};
use crate::error::{Error, Result};

/// Protocol tag for HTTP/1.1-style requests.
pub const PROTOCOL_HTTP_1_1: u16 = 11;

// =============================================================================
// Content Type
// =============================================================================

/// Category of a served resource, derived from its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Html,
    Text,
    Image,
    Unknown,
}

impl ContentType {
    /// Classify a resource key by its extension.
    pub fn from_key(key: &str) -> Self {
        match key.rsplit('.').next() {
            Some("html") | Some("htm") => ContentType::Html,
            Some("txt") | Some("css") | Some("js") => ContentType::Text,
            Some("png") | Some("jpg") | Some("jpeg") | Some("gif") | Some("ico") => {
                ContentType::Image
            }
            _ => ContentType::Unknown,
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentType::Html => write!(f, "html"),
            ContentType::Text => write!(f, "text"),
            ContentType::Image => write!(f, "image"),
            ContentType::Unknown => write!(f, "unknown"),
        }
    }
}

// =============================================================================
// Status Code
// =============================================================================

/// HTTP-like status code carried on replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(200);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const GATEWAY_TIMEOUT: StatusCode = StatusCode(504);

    /// True for the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.0)
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Request
// =============================================================================

/// An inbound or outbound resource request.
///
/// The resource key is carried inside the request line ("GET /x.html") and
/// extracted with [`RequestMessage::resource_key`]; a line with no path token
/// is a structural error, never a lookup for an empty key.
#[derive(Debug, Clone)]
pub struct RequestMessage {
    /// Request line, e.g. "GET /index.html"
    pub request_line: String,
    /// Identity of the node (or client) that issued this request
    pub originator: NodeId,
    /// Protocol tag (see [`PROTOCOL_HTTP_1_1`])
    pub protocol: u16,
    /// Correlation id assigned by the dispatching caller, echoed back by
    /// the responder
    pub correlation_id: CorrelationId,
}

impl RequestMessage {
    /// Build a GET request for the given resource path.
    pub fn get(resource: impl AsRef<str>, originator: NodeId) -> Self {
        let resource = resource.as_ref();
        let path = resource.strip_prefix('/').unwrap_or(resource);
        Self {
            request_line: format!("GET /{path}"),
            originator,
            protocol: PROTOCOL_HTTP_1_1,
            correlation_id: CorrelationId(0),
        }
    }

    /// Set the correlation id before dispatch.
    pub fn with_correlation(mut self, id: CorrelationId) -> Self {
        self.correlation_id = id;
        self
    }

    /// Set the originator, used when re-issuing a request under this
    /// node's own identity.
    pub fn with_originator(mut self, originator: NodeId) -> Self {
        self.originator = originator;
        self
    }

    /// Extract the resource key from the request line.
    ///
    /// The key is the second whitespace token with its leading slash
    /// removed ("GET /x.html" yields "x.html").
    pub fn resource_key(&self) -> Result<String> {
        let path = self
            .request_line
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| Error::MalformedRequest(self.request_line.clone()))?;
        let key = path.trim_start_matches('/');
        if key.is_empty() {
            return Err(Error::MalformedRequest(self.request_line.clone()));
        }
        Ok(key.to_string())
    }

    /// Content category of the requested resource.
    pub fn content_type(&self) -> Result<ContentType> {
        Ok(ContentType::from_key(&self.resource_key()?))
    }
}

// =============================================================================
// Reply
// =============================================================================

/// A reply to a resource request.
#[derive(Debug, Clone)]
pub struct ReplyMessage {
    /// Status of the resolution (200-equivalent on success)
    pub status: StatusCode,
    /// Resource content; empty on failures
    pub payload: Bytes,
    /// Category of the carried content
    pub content_type: ContentType,
    /// Correlation id echoed from the request
    pub correlation_id: CorrelationId,
    /// Identity of the node that produced this reply
    pub originator: NodeId,
}

impl ReplyMessage {
    /// Build a success reply carrying content.
    pub fn ok(
        payload: Bytes,
        content_type: ContentType,
        correlation_id: CorrelationId,
        originator: NodeId,
    ) -> Self {
        Self {
            status: StatusCode::OK,
            payload,
            content_type,
            correlation_id,
            originator,
        }
    }

    /// Build a failure reply with an empty payload.
    pub fn error(status: StatusCode, correlation_id: CorrelationId, originator: NodeId) -> Self {
        Self {
            status,
            payload: Bytes::new(),
            content_type: ContentType::Unknown,
            correlation_id,
            originator,
        }
    }

    /// Rewrite correlation id and originator for delivery to a waiter.
    pub fn for_waiter(&self, correlation_id: CorrelationId, originator: NodeId) -> Self {
        let mut reply = self.clone();
        reply.correlation_id = correlation_id;
        reply.originator = originator;
        reply
    }
}

// =============================================================================
// Inbound Events
// =============================================================================

/// One unit of inbound work for a node's event loop.
#[derive(Debug)]
pub enum InboundEvent {
    /// A resource request arrived on a connection
    Request {
        request: RequestMessage,
        connection: ConnectionId,
    },
    /// A reply to a previously dispatched lookup arrived
    Reply(ReplyMessage),
}

// =============================================================================
// Tests
// =============================================================================
