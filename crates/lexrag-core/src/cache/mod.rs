//! Response Cache
//!
//! Content-addressed cache keyed by a SHA-256 hash of the normalized query.
//! Expiry is enforced at read time; physical deletion of expired rows
//! belongs to an external housekeeping job. A cache hit is treated as fully
//! trusted: it returns at confidence 1.0 regardless of the stored response's
//! own confidence.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::query::{normalize_query, QueryType};
use crate::router::RouteResponse;
use crate::storage::{CacheRecord, Datastore};

// ============================================================================
// CONFIG
// ============================================================================

/// Configuration for response caching
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Time-to-live for stored responses
    pub ttl_seconds: i64,
    /// Responses at or below this confidence are not cached
    pub min_confidence: f32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 86_400,
            min_confidence: 0.7,
        }
    }
}

// ============================================================================
// KEYS
// ============================================================================

/// Stable cache key: SHA-256 hex of the normalized query text
pub fn query_hash(query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_query(query).as_bytes());
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// CACHE
// ============================================================================

/// Datastore-backed response cache
pub struct ResponseCache {
    datastore: Arc<dyn Datastore>,
    config: CacheConfig,
}

impl ResponseCache {
    pub fn new(datastore: Arc<dyn Datastore>, config: CacheConfig) -> Self {
        Self { datastore, config }
    }

    /// Look a query up. On a live hit the entry's hit count is incremented
    /// and its last-accessed timestamp refreshed; the response comes back
    /// with `from_cache = true` at confidence 1.0.
    pub async fn lookup(&self, query: &str) -> Option<RouteResponse> {
        let hash = query_hash(query);

        let record = match self.datastore.cache_fetch(&hash).await {
            Ok(record) => record?,
            Err(e) => {
                warn!(error = %e, "cache fetch failed");
                return None;
            }
        };

        if record.expires_at <= Utc::now() {
            debug!(query_hash = %hash, "cache entry expired");
            return None;
        }

        if let Err(e) = self.datastore.cache_touch(&hash).await {
            warn!(error = %e, "cache touch failed");
        }

        let sources = serde_json::from_str(&record.source_documents).unwrap_or_default();

        Some(RouteResponse {
            answer: record.response_text,
            sources,
            confidence: 1.0,
            from_cache: true,
            query_type: QueryType::parse_name(&record.query_type),
            strategies: Vec::new(),
        })
    }

    /// Persist a response if it clears the confidence threshold. Upsert
    /// semantics: a repeated store for the same query refreshes content and
    /// TTL and increments the hit count.
    pub async fn store(&self, query: &str, response: &RouteResponse) {
        if response.from_cache || response.confidence <= self.config.min_confidence {
            return;
        }

        let now = Utc::now();
        let record = CacheRecord {
            query_hash: query_hash(query),
            query_text: normalize_query(query),
            query_type: response.query_type.as_str().to_string(),
            response_text: response.answer.clone(),
            source_documents: serde_json::to_string(&response.sources)
                .unwrap_or_else(|_| "[]".to_string()),
            ttl_seconds: self.config.ttl_seconds,
            expires_at: now + Duration::seconds(self.config.ttl_seconds),
            hit_count: 0,
            created_at: now,
            last_accessed_at: now,
        };

        if let Err(e) = self.datastore.cache_upsert(&record).await {
            warn!(error = %e, "cache store failed");
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
