//! Edge-Node Resolution Engine
//!
//! The per-request machinery of one caching edge node:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       EdgeNode (facade)                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  LruCache        │  PendingTable       │  resolution (pure)  │
//! │  (bounded store) │  (correlation +     │  (miss target +     │
//! │                  │   coalescing +      │   reply disposition)│
//! │                  │   deadlines)        │                     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A miss queries the configured peer first and escalates to the origin on
//! a peer miss, reusing the correlation id; successes are cached and fanned
//! out to every coalesced waiter.

mod counters;
mod edge;
mod pending;
mod resolution;

pub use counters::{CountersSnapshot, ServiceCounters};
pub use edge::EdgeNode;
pub use pending::{Admission, PendingRequest, PendingTable, SettleOutcome, Waiter};
pub use resolution::{
    on_reply, LookupTarget, ReplyDisposition, ResolutionPolicy, ResolutionStage,
};
