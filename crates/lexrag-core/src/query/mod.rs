//! Query Understanding
//!
//! Normalization, structured entity extraction and intent classification for
//! incoming natural-language legal queries.

mod classifier;
mod entities;

pub use classifier::{
    ClassifierConfig, IntentHint, QueryClassification, QueryClassifier, QueryType,
    RetrievalStrategy,
};
pub use entities::{extract_entities, EntityType, QueryEntity};

/// Normalize a raw query: lowercase, collapse runs of whitespace, trim.
///
/// The normalized form seeds both classification and the cache key, so it
/// must be idempotent: `normalize_query(normalize_query(q)) == normalize_query(q)`.
pub fn normalize_query(query: &str) -> String {
    query
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// TESTS
// ============================================================================
