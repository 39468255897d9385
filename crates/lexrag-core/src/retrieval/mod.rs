//! Retrieval Strategies
//!
//! Four independent retrievers share one contract:
//! `search(query, scope) -> Vec<SearchResult>`. A retriever never errors on
//! "no results" and never propagates a collaborator failure - embedding or
//! datastore errors are logged and degrade to an empty list. Scores are
//! retriever-specific and NOT comparable across source types until fused.

mod fusion;
mod keyword;
mod metadata;
mod semantic;
mod summary;

pub use fusion::{reciprocal_rank_fusion, FusionConfig, WeightedResults};
pub use keyword::KeywordRetriever;
pub use metadata::MetadataRetriever;
pub use semantic::SemanticRetriever;
pub use summary::SummaryRetriever;

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::services::ServiceError;
use crate::storage::{ScoredPassage, StorageError};

// ============================================================================
// RESULT TYPES
// ============================================================================

/// Which retriever produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Semantic,
    Keyword,
    Metadata,
    Summary,
}

impl SourceType {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Semantic => "semantic",
            SourceType::Keyword => "keyword",
            SourceType::Metadata => "metadata",
            SourceType::Summary => "summary",
        }
    }
}

/// One retrieved passage, regardless of which retriever produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Source document/article/section identifier
    pub id: String,
    /// Retrieved text span
    pub content: String,
    /// Retriever-specific relevance score, always finite
    pub score: f32,
    pub source_type: SourceType,
    /// Free-form attributes (document title, article number, ...)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl SearchResult {
    /// Build a result from a scored passage, clamping non-finite scores
    pub(crate) fn from_passage(hit: ScoredPassage, source_type: SourceType) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert(
            "documentId".to_string(),
            serde_json::Value::String(hit.document_id),
        );
        metadata.insert(
            "documentTitle".to_string(),
            serde_json::Value::String(hit.document_title),
        );
        Self {
            id: hit.id,
            content: hit.content,
            score: clamp_score(hit.score),
            source_type,
            metadata,
        }
    }
}

/// Replace NaN/infinite scores with 0.0 and floor negatives
pub(crate) fn clamp_score(score: f32) -> f32 {
    if score.is_finite() { score.max(0.0) } else { 0.0 }
}

// ============================================================================
// CONFIG
// ============================================================================

/// Shared retriever configuration
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Top-K for semantic and keyword passage search
    pub passage_limit: usize,
    /// Top-K for metadata document matching
    pub metadata_limit: usize,
    /// Top-K for summary search
    pub summary_limit: usize,
    /// Fixed score assigned to metadata hits (no fine-grained ranking)
    pub metadata_score: f32,
    /// Deadline for one retriever invocation
    pub timeout: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            passage_limit: 20,
            metadata_limit: 10,
            summary_limit: 10,
            metadata_score: 0.8,
            timeout: Duration::from_secs(5),
        }
    }
}

// ============================================================================
// INTERNAL ERRORS
// ============================================================================

/// Why one retrieval attempt failed; recovered locally, never surfaced
#[derive(Debug, thiserror::Error)]
pub(crate) enum RetrievalError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

// ============================================================================
// TESTS
// ============================================================================
