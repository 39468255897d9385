//! Storage Layer
//!
//! Datastore contract consumed by the retrievers and the response cache,
//! plus the bundled SQLite implementation:
//! - Vector similarity over stored passage/summary embeddings
//! - FTS5 ranked full-text search with query sanitization
//! - Structural lookup by document / article / chapter identifier
//! - Cache table CRUD with atomic upsert-by-key

mod migrations;
mod sqlite;

pub use migrations::MIGRATIONS;
pub use sqlite::{Result, SqliteDatastore, StorageError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// SCOPE
// ============================================================================

/// The corpus subset a query is allowed to search: the documents attached to
/// one case plus, optionally, the shared legal library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    /// Case whose attached documents are searchable
    pub case_id: Option<String>,
    /// Whether library documents (no case) are included
    pub include_library: bool,
}

impl Scope {
    /// Library-only scope
    pub fn library() -> Self {
        Self {
            case_id: None,
            include_library: true,
        }
    }

    /// A case's documents plus the library
    pub fn for_case(case_id: impl Into<String>) -> Self {
        Self {
            case_id: Some(case_id.into()),
            include_library: true,
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::library()
    }
}

// ============================================================================
// CORPUS RECORDS
// ============================================================================

/// A legal document with its structural metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: String,
    pub title: String,
    /// Short description stored alongside the document
    pub summary: Option<String>,
    /// Owning case; None marks a shared library document
    pub case_id: Option<String>,
    /// Whether structural analysis has completed
    pub analyzed: bool,
    pub total_articles: Option<i64>,
    pub total_chapters: Option<i64>,
    pub total_sections: Option<i64>,
    pub table_of_contents: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Kinds of structural units inside a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Article,
    Chapter,
    Section,
}

impl SectionKind {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Article => "article",
            SectionKind::Chapter => "chapter",
            SectionKind::Section => "section",
        }
    }
}

/// One structural unit (article, chapter, section) of a document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRecord {
    pub id: String,
    pub document_id: String,
    pub kind: SectionKind,
    /// Normalized unit number ("76", "ii")
    pub number: String,
    pub title: Option<String>,
    pub content: String,
}

/// A retrievable text chunk with ingestion order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassageRecord {
    pub id: String,
    pub document_id: String,
    /// Position of the passage within its document
    pub seq: i64,
    pub content: String,
}

/// A passage or summary hit with its retriever-specific score
#[derive(Debug, Clone)]
pub struct ScoredPassage {
    pub id: String,
    pub document_id: String,
    pub document_title: String,
    pub content: String,
    pub score: f32,
}

/// A stored executive summary for a document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    pub id: String,
    pub document_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// CACHE RECORDS
// ============================================================================

/// One persisted cache entry, keyed by the normalized-query hash
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    pub query_hash: String,
    pub query_text: String,
    pub query_type: String,
    pub response_text: String,
    /// Serialized cited sources (JSON array)
    pub source_documents: String,
    pub ttl_seconds: i64,
    pub expires_at: DateTime<Utc>,
    pub hit_count: i64,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

// ============================================================================
// DATASTORE CONTRACT
// ============================================================================

/// The datastore collaborator.
///
/// Implementations never embed anything themselves: vector search takes a
/// caller-provided query vector and compares it against stored embeddings.
/// All search methods return results best-first.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Vector similarity over passage embeddings
    async fn passage_vector_search(
        &self,
        scope: &Scope,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPassage>>;

    /// Vector similarity restricted to the pre-computed summary corpus
    async fn summary_vector_search(
        &self,
        scope: &Scope,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPassage>>;

    /// Ranked full-text search over passage content
    async fn passage_text_search(
        &self,
        scope: &Scope,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredPassage>>;

    /// Documents whose title or stored summary contains the needle
    async fn documents_matching(
        &self,
        scope: &Scope,
        needle: &str,
        limit: usize,
    ) -> Result<Vec<DocumentRecord>>;

    /// Default target document for a scope when the query names none
    async fn most_relevant_document(&self, scope: &Scope) -> Result<Option<DocumentRecord>>;

    /// Structural lookup of one unit by kind and number
    async fn find_section(
        &self,
        scope: &Scope,
        kind: SectionKind,
        number: &str,
    ) -> Result<Option<SectionRecord>>;

    /// Most recent stored executive summary for a document
    async fn stored_summary(&self, document_id: &str) -> Result<Option<SummaryRecord>>;

    /// First passages of a document in ingestion order
    async fn first_passages(&self, document_id: &str, limit: usize)
        -> Result<Vec<PassageRecord>>;

    /// Read a cache entry without touching its counters
    async fn cache_fetch(&self, query_hash: &str) -> Result<Option<CacheRecord>>;

    /// Record a cache hit: increment hit count, refresh last-accessed
    async fn cache_touch(&self, query_hash: &str) -> Result<()>;

    /// Insert or refresh a cache entry. Repeated stores for the same key
    /// replace content and TTL and increment the hit count.
    async fn cache_upsert(&self, record: &CacheRecord) -> Result<()>;
}
