//! # LexRAG Core
//!
//! Query routing and hybrid retrieval engine for legal document corpora:
//!
//! - **Intent Classification**: declarative pattern-vote over six query
//!   categories, with an optional advisory LLM intent hint
//! - **Entity Extraction**: article/chapter/section numbers, named laws,
//!   dates and quoted phrases from raw query text
//! - **Four Retrieval Strategies**: semantic (vector similarity), keyword
//!   (FTS5/bm25), metadata (document lookup) and summary search
//! - **RRF Fusion**: weighted Reciprocal Rank Fusion across retrievers
//! - **Answer Synthesis**: intent-specific prompts over retrieved context
//! - **Response Cache**: content-addressed by normalized-query hash, with
//!   read-time TTL expiry and hit-count tracking
//!
//! The engine consumes a text corpus prepared by an upstream ingestion
//! pipeline; embedding generation and chat completion are injected
//! collaborators, so the whole router runs against fakes in tests.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lexrag_core::{QueryRouter, RouterConfig, Scope, SqliteDatastore};
//!
//! let datastore = Arc::new(SqliteDatastore::open(&path)?);
//! let router = QueryRouter::new(datastore, embedding, completion, RouterConfig::default());
//!
//! let response = router.route("¿Qué dice el artículo 76?", &Scope::library()).await;
//! println!("{} (confidence {})", response.answer, response.confidence);
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod cache;
pub mod query;
pub mod retrieval;
pub mod router;
pub mod services;
pub mod storage;
pub mod synthesis;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Query understanding
pub use query::{
    extract_entities, normalize_query, ClassifierConfig, EntityType, IntentHint,
    QueryClassification, QueryClassifier, QueryEntity, QueryType, RetrievalStrategy,
};

// Services (dependency-injection seams)
pub use services::{
    cosine_similarity, CompletionService, EmbeddingService, QueryEmbedder, ServiceError,
};

// Storage layer
pub use storage::{
    CacheRecord, Datastore, DocumentRecord, PassageRecord, Result, Scope, ScoredPassage,
    SectionKind, SectionRecord, SqliteDatastore, StorageError, SummaryRecord,
};

// Retrieval and fusion
pub use retrieval::{
    reciprocal_rank_fusion, FusionConfig, KeywordRetriever, MetadataRetriever, RetrievalConfig,
    SearchResult, SemanticRetriever, SourceType, SummaryRetriever, WeightedResults,
};

// Synthesis
pub use synthesis::{PromptVariant, SynthesisConfig, Synthesizer, SYNTHESIS_FALLBACK};

// Caching
pub use cache::{query_hash, CacheConfig, ResponseCache};

// Router
pub use router::{QueryRouter, RouteResponse, RouterConfig};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        CompletionService, Datastore, EmbeddingService, QueryClassifier, QueryRouter, QueryType,
        Result, RouteResponse, RouterConfig, Scope, SearchResult, SqliteDatastore, StorageError,
    };
}
