//! Prometheus Metrics Exposition
//!
//! Gauges mirroring the node's observable counters, cache statistics and
//! pending-lookup depth. [`publish`] refreshes them from snapshots; the
//! binary's metrics server calls it on every scrape so the gauges always
//! reflect current state.

use once_cell::sync::Lazy;
use prometheus::{register_int_gauge_vec, IntGaugeVec};

use crate::cache::CacheStats;
use crate::node::CountersSnapshot;

static HTML_DOCS_SERVED: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "edgecache_html_docs_served",
        "HTML documents served, by node",
        &["node"]
    )
    .expect("metric registration")
});

static TEXT_RESOURCES_SERVED: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "edgecache_text_resources_served",
        "Text resources served, by node",
        &["node"]
    )
    .expect("metric registration")
});

static IMG_RESOURCES_SERVED: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "edgecache_img_resources_served",
        "Image resources served, by node",
        &["node"]
    )
    .expect("metric registration")
});

static BAD_REQUESTS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "edgecache_bad_requests",
        "Refused requests, by node",
        &["node"]
    )
    .expect("metric registration")
});

static CACHE_ENTRIES: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "edgecache_cache_entries",
        "Current cache entry count, by node",
        &["node"]
    )
    .expect("metric registration")
});

static CACHE_HITS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!("edgecache_cache_hits", "Cache hits, by node", &["node"])
        .expect("metric registration")
});

static CACHE_MISSES: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!("edgecache_cache_misses", "Cache misses, by node", &["node"])
        .expect("metric registration")
});

static CACHE_EVICTIONS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "edgecache_cache_evictions",
        "Cache evictions, by node",
        &["node"]
    )
    .expect("metric registration")
});

static PENDING_LOOKUPS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "edgecache_pending_lookups",
        "Outstanding lookups, by node",
        &["node"]
    )
    .expect("metric registration")
});

/// Refresh the gauges for one node from its snapshots.
pub fn publish(node: &str, counters: &CountersSnapshot, cache: &CacheStats, pending: usize) {
    HTML_DOCS_SERVED
        .with_label_values(&[node])
        .set(counters.html_docs_served as i64);
    TEXT_RESOURCES_SERVED
        .with_label_values(&[node])
        .set(counters.text_resources_served as i64);
    IMG_RESOURCES_SERVED
        .with_label_values(&[node])
        .set(counters.img_resources_served as i64);
    BAD_REQUESTS
        .with_label_values(&[node])
        .set(counters.bad_requests as i64);
    CACHE_ENTRIES
        .with_label_values(&[node])
        .set(cache.entries as i64);
    CACHE_HITS.with_label_values(&[node]).set(cache.hits as i64);
    CACHE_MISSES
        .with_label_values(&[node])
        .set(cache.misses as i64);
    CACHE_EVICTIONS
        .with_label_values(&[node])
        .set(cache.evictions as i64);
    PENDING_LOOKUPS.with_label_values(&[node]).set(pending as i64);
}

// =============================================================================
// Tests
// =============================================================================
