//! Service Fakes
//!
//! Deterministic in-process implementations of the collaborator traits.
//! The hashing embedder maps token overlap to cosine similarity, so
//! semantically "related" fixture texts actually rank above unrelated ones.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use lexrag_core::{CompletionService, EmbeddingService, ServiceError};

/// Default dimensionality for test embeddings
pub const TEST_EMBEDDING_DIMS: usize = 32;

/// Bag-of-words embedding: each token hashes into one bucket, L2-normalized.
/// Shared tokens between two texts produce positive cosine similarity.
pub fn hash_embedding(text: &str, dims: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dims];
    for token in text.to_lowercase().split_whitespace() {
        let token: String = token.chars().filter(|c| c.is_alphanumeric()).collect();
        if token.is_empty() {
            continue;
        }
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in token.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        vector[(hash % dims as u64) as usize] += 1.0;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}

/// Deterministic embedding service
pub struct HashEmbedder {
    pub dims: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self {
            dims: TEST_EMBEDDING_DIMS,
        }
    }
}

#[async_trait]
impl EmbeddingService for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        Ok(hash_embedding(text, self.dims))
    }
}

/// Embedding service that always fails
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingService for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ServiceError> {
        Err(ServiceError::Backend("embedding backend down".to_string()))
    }
}

/// Completion service that returns a fixed answer and counts calls
pub struct CannedCompletion {
    pub answer: String,
    pub calls: AtomicUsize,
}

impl CannedCompletion {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionService for CannedCompletion {
    async fn complete(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<String, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer.clone())
    }
}

/// Completion service that always fails
pub struct FailingCompletion;

#[async_trait]
impl CompletionService for FailingCompletion {
    async fn complete(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<String, ServiceError> {
        Err(ServiceError::Backend("completion backend down".to_string()))
    }
}
