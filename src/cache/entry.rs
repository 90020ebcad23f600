//! Cache Entry Types

use bytes::Bytes;

use crate::message::ContentType;

/// A cached resource: opaque payload plus its content category.
///
/// Entries are never mutated in place; a `put` for an existing key replaces
/// the entry and refreshes its recency.
#[derive(Clone)]
pub struct CacheEntry {
    /// Resource content (zero-copy)
    payload: Bytes,
    /// Category of the content
    content_type: ContentType,
}

impl CacheEntry {
    /// Create a new cache entry.
    pub fn new(payload: Bytes, content_type: ContentType) -> Self {
        Self {
            payload,
            content_type,
        }
    }

    /// Get the payload (zero-copy).
    #[inline]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Get the content category.
    #[inline]
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Get the payload size in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.payload.len() as u64
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("size", &self.size())
            .field("content_type", &self.content_type)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
