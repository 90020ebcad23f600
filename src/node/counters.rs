//! Service Counters
//!
//! Observable per-category counters exposed for monitoring: resources
//! served by category plus refused bad requests.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::message::ContentType;

/// Counter set for one edge node.
#[derive(Debug, Default)]
pub struct ServiceCounters {
    html_docs_served: AtomicU64,
    text_resources_served: AtomicU64,
    img_resources_served: AtomicU64,
    bad_requests: AtomicU64,
}

impl ServiceCounters {
    /// Create a new counter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a request for a resource of the given category.
    ///
    /// Unknown categories are not counted; the caller logs them.
    pub fn record_served(&self, content_type: ContentType) {
        match content_type {
            ContentType::Html => {
                self.html_docs_served.fetch_add(1, Ordering::Relaxed);
            }
            ContentType::Text => {
                self.text_resources_served.fetch_add(1, Ordering::Relaxed);
            }
            ContentType::Image => {
                self.img_resources_served.fetch_add(1, Ordering::Relaxed);
            }
            ContentType::Unknown => {}
        }
    }

    /// Count a refused request.
    pub fn record_bad_request(&self) {
        self.bad_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn html_docs_served(&self) -> u64 {
        self.html_docs_served.load(Ordering::Relaxed)
    }

    pub fn text_resources_served(&self) -> u64 {
        self.text_resources_served.load(Ordering::Relaxed)
    }

    pub fn img_resources_served(&self) -> u64 {
        self.img_resources_served.load(Ordering::Relaxed)
    }

    pub fn bad_requests(&self) -> u64 {
        self.bad_requests.load(Ordering::Relaxed)
    }

    /// Get a point-in-time snapshot.
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            html_docs_served: self.html_docs_served(),
            text_resources_served: self.text_resources_served(),
            img_resources_served: self.img_resources_served(),
            bad_requests: self.bad_requests(),
        }
    }
}

/// Counter snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountersSnapshot {
    pub html_docs_served: u64,
    pub text_resources_served: u64,
    pub img_resources_served: u64,
    pub bad_requests: u64,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_counting() {
        let counters = ServiceCounters::new();
        counters.record_served(ContentType::Html);
        counters.record_served(ContentType::Html);
        counters.record_served(ContentType::Text);
        counters.record_served(ContentType::Image);
        counters.record_served(ContentType::Unknown);

        assert_eq!(counters.html_docs_served(), 2);
        assert_eq!(counters.text_resources_served(), 1);
        assert_eq!(counters.img_resources_served(), 1);
        assert_eq!(counters.bad_requests(), 0);
    }

    #[test]
    fn test_bad_request_counting() {
        let counters = ServiceCounters::new();
        counters.record_bad_request();
        counters.record_bad_request();
        assert_eq!(counters.bad_requests(), 2);
    }

    #[test]
    fn test_snapshot() {
        let counters = ServiceCounters::new();
        counters.record_served(ContentType::Html);
        counters.record_bad_request();

        let snap = counters.snapshot();
        assert_eq!(
            snap,
            CountersSnapshot {
                html_docs_served: 1,
                text_resources_served: 0,
                img_resources_served: 0,
                bad_requests: 1,
            }
        );

        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("html_docs_served"));
    }
}
