//! Recording Transport
//!
//! Transport test double that captures every dispatched lookup and sent
//! reply for inspection, delivering nothing. Facade-level tests assert on
//! the captured traffic.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::ports::{ConnectionId, NodeId, Transport};
use crate::error::Result;
use crate::message::{ReplyMessage, RequestMessage};

/// A captured outbound lookup.
#[derive(Debug, Clone)]
pub struct DispatchedLookup {
    pub target: NodeId,
    pub request: RequestMessage,
}

/// A captured reply send.
#[derive(Debug, Clone)]
pub struct SentReply {
    pub connection: ConnectionId,
    pub reply: ReplyMessage,
}

/// Transport double recording all traffic.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    dispatched: RwLock<Vec<DispatchedLookup>>,
    sent: RwLock<Vec<SentReply>>,
    closed: RwLock<Vec<ConnectionId>>,
}

impl RecordingTransport {
    /// Create a new recording transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// All dispatched lookups, in order.
    pub fn dispatched(&self) -> Vec<DispatchedLookup> {
        self.dispatched.read().clone()
    }

    /// All sent replies, in order.
    pub fn sent_replies(&self) -> Vec<SentReply> {
        self.sent.read().clone()
    }

    /// All closed connections, in order.
    pub fn closed(&self) -> Vec<ConnectionId> {
        self.closed.read().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_reply(&self, connection: ConnectionId, reply: ReplyMessage) -> Result<()> {
        self.sent.write().push(SentReply { connection, reply });
        Ok(())
    }

    async fn close_connection(&self, connection: ConnectionId) -> Result<()> {
        self.closed.write().push(connection);
        Ok(())
    }

    async fn dispatch_lookup(&self, target: &NodeId, request: RequestMessage) -> Result<()> {
        self.dispatched.write().push(DispatchedLookup {
            target: target.clone(),
            request,
        });
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::CorrelationId;
    use crate::message::StatusCode;

    #[test]
    fn test_records_traffic_in_order() {
        tokio_test::block_on(async {
            let transport = RecordingTransport::new();

            let request = RequestMessage::get("/a.html", NodeId::new("cdn1"));
            transport
                .dispatch_lookup(&NodeId::new("cdn2"), request)
                .await
                .unwrap();
            transport
                .send_reply(
                    ConnectionId(1),
                    ReplyMessage::error(
                        StatusCode::BAD_REQUEST,
                        CorrelationId(1),
                        NodeId::new("cdn1"),
                    ),
                )
                .await
                .unwrap();
            transport.close_connection(ConnectionId(1)).await.unwrap();

            assert_eq!(transport.dispatched().len(), 1);
            assert_eq!(transport.sent_replies().len(), 1);
            assert_eq!(transport.closed(), vec![ConnectionId(1)]);
        });
    }
}
