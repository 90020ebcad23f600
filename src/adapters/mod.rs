//! Infrastructure Adapters
//!
//! Concrete implementations of the domain ports:
//!
//! - [`loopback`] - In-process message router (`Transport`)
//! - [`recording`] - Traffic-capturing transport double (`Transport`)
//! - [`event_sink`] - Logging and in-memory event sinks (`EventSink`)

pub mod event_sink;
pub mod loopback;
pub mod recording;

pub use event_sink::{InMemoryEventCollector, LoggingEventSink};
pub use loopback::LoopbackNetwork;
pub use recording::RecordingTransport;
