//! External Service Interfaces
//!
//! The engine does not own embedding generation or answer completion - both
//! are upstream collaborators injected at construction time:
//! - `EmbeddingService` turns text into fixed-dimensionality vectors
//! - `CompletionService` produces chat completions from role-based prompts
//!
//! Keeping them behind traits lets the router run against in-process fakes
//! in tests and against any provider in production.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lru::LruCache;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Error from an external collaborator call
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The call exceeded its deadline
    #[error("service call timed out")]
    Timeout,
    /// The backend rejected or failed the call
    #[error("service backend error: {0}")]
    Backend(String),
    /// The backend answered with no usable content
    #[error("service returned empty content")]
    Empty,
}

// ============================================================================
// SERVICE TRAITS
// ============================================================================

/// Text embedding collaborator.
///
/// Implementations must truncate oversized input rather than error, and must
/// return vectors of a single fixed dimensionality.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embed a piece of text into a dense vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError>;
}

/// Chat completion collaborator.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Produce a completion for the given system/user prompt pair.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ServiceError>;
}

// ============================================================================
// QUERY EMBEDDER
// ============================================================================

/// Capacity of the query-embedding LRU cache
const QUERY_CACHE_CAPACITY: usize = 100;

/// Embedding front-end with an LRU cache keyed by query text.
///
/// Repeated queries skip the embedding service entirely, which matters when
/// the semantic and summary retrievers both embed the same query in one
/// request.
pub struct QueryEmbedder {
    service: Arc<dyn EmbeddingService>,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl QueryEmbedder {
    /// Wrap an embedding service with the default cache capacity.
    pub fn new(service: Arc<dyn EmbeddingService>) -> Self {
        Self {
            service,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(QUERY_CACHE_CAPACITY).expect("capacity is non-zero"),
            )),
        }
    }

    /// Embed a query, consulting the cache first.
    pub async fn embed(&self, query: &str) -> Result<Vec<f32>, ServiceError> {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(vector) = cache.get(query) {
                return Ok(vector.clone());
            }
        }

        let vector = self.service.embed(query).await?;

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(query.to_string(), vector.clone());
        }

        Ok(vector)
    }
}

// ============================================================================
// SIMILARITY
// ============================================================================

/// Cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched dimensions or zero-magnitude inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a <= 0.0 || norm_b <= 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

// ============================================================================
// TESTS
// ============================================================================
