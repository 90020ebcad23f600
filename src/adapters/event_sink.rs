//! Event Sink Adapters
//!
//! Implements the `EventSink` port with various backends.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::events::NodeEvent;
use crate::domain::ports::EventSink;
use crate::error::Result;

/// Logging-based event sink.
///
/// Publishes node events to the tracing/logging system.
/// Useful for development, debugging, and audit trails.
#[derive(Debug, Clone, Default)]
pub struct LoggingEventSink {
    /// Whether to log events at info level (true) or debug level (false)
    info_level: bool,
}

impl LoggingEventSink {
    /// Create a new logging event sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink that logs at info level.
    pub fn info_level() -> Self {
        Self { info_level: true }
    }

    /// Create a sink that logs at debug level.
    pub fn debug_level() -> Self {
        Self { info_level: false }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event: NodeEvent) -> Result<()> {
        let event_type = event.event_type();
        let json = serde_json::to_string(&event).unwrap_or_else(|_| format!("{:?}", event));

        if self.info_level {
            info!(event_type = %event_type, event = %json, "Node event");
        } else {
            debug!(event_type = %event_type, event = %json, "Node event");
        }

        Ok(())
    }
}

/// In-memory event collector for testing.
///
/// Collects events in memory for later inspection during tests.
#[derive(Debug, Default)]
pub struct InMemoryEventCollector {
    events: parking_lot::RwLock<Vec<NodeEvent>>,
}

impl InMemoryEventCollector {
    /// Create a new in-memory event collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected events.
    pub fn events(&self) -> Vec<NodeEvent> {
        self.events.read().clone()
    }

    /// Get the count of collected events.
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Check if there are no events.
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clear all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Get events of a specific type.
    pub fn events_of_type(&self, event_type: &str) -> Vec<NodeEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for InMemoryEventCollector {
    async fn emit(&self, event: NodeEvent) -> Result<()> {
        self.events.write().push(event);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
