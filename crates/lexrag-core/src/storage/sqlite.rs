//! SQLite Datastore Implementation
//!
//! Single-file corpus store with FTS5 keyword search, embedded vector
//! storage and the response-cache table.
//!
//! Uses separate reader/writer connections for interior mutability. All
//! methods take `&self`, making the store `Send + Sync` so the router can
//! hold it behind an `Arc<dyn Datastore>`.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::services::cosine_similarity;
use crate::storage::{
    CacheRecord, Datastore, DocumentRecord, PassageRecord, Scope, ScoredPassage, SectionKind,
    SectionRecord, SummaryRecord,
};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Storage error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Invalid timestamp
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    /// Initialization error
    #[error("Initialization error: {0}")]
    Init(String),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

// ============================================================================
// DATASTORE
// ============================================================================

/// SQLite-backed datastore
pub struct SqliteDatastore {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

impl SqliteDatastore {
    /// Apply PRAGMAs to a connection
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;

        Ok(())
    }

    /// Open (or create) a datastore at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let writer_conn = Connection::open(path)?;
        Self::configure_connection(&writer_conn)?;

        // Apply migrations on writer only
        super::migrations::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open(path)?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
        })
    }

    fn reader(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.reader
            .lock()
            .map_err(|_| StorageError::Init("Reader lock poisoned".to_string()))
    }

    fn writer(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| StorageError::Init("Writer lock poisoned".to_string()))
    }

    // ========================================================================
    // CORPUS WRITES (consumed by the upstream ingestion pipeline and tests)
    // ========================================================================

    /// Insert or replace a document row
    pub fn upsert_document(&self, doc: &DocumentRecord) -> Result<()> {
        let now = Utc::now();
        let writer = self.writer()?;
        writer.execute(
            "INSERT INTO documents (
                id, title, summary, case_id, created_at, updated_at,
                analyzed, total_articles, total_chapters, total_sections, table_of_contents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                summary = excluded.summary,
                case_id = excluded.case_id,
                updated_at = excluded.updated_at,
                analyzed = excluded.analyzed,
                total_articles = excluded.total_articles,
                total_chapters = excluded.total_chapters,
                total_sections = excluded.total_sections,
                table_of_contents = excluded.table_of_contents",
            params![
                doc.id,
                doc.title,
                doc.summary,
                doc.case_id,
                doc.created_at.to_rfc3339(),
                now.to_rfc3339(),
                doc.analyzed,
                doc.total_articles,
                doc.total_chapters,
                doc.total_sections,
                doc.table_of_contents,
            ],
        )?;
        Ok(())
    }

    /// Insert a structural section
    pub fn insert_section(&self, section: &SectionRecord) -> Result<()> {
        let writer = self.writer()?;
        writer.execute(
            "INSERT INTO document_sections (id, document_id, kind, number, title, content)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                section.id,
                section.document_id,
                section.kind.as_str(),
                section.number,
                section.title,
                section.content,
            ],
        )?;
        Ok(())
    }

    /// Insert a passage, optionally with its embedding
    pub fn insert_passage(&self, passage: &PassageRecord, embedding: Option<&[f32]>) -> Result<()> {
        let writer = self.writer()?;
        writer.execute(
            "INSERT INTO passages (id, document_id, seq, content) VALUES (?1, ?2, ?3, ?4)",
            params![passage.id, passage.document_id, passage.seq, passage.content],
        )?;
        if let Some(vector) = embedding {
            writer.execute(
                "INSERT INTO passage_embeddings (passage_id, embedding, dimensions, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    passage.id,
                    embedding_to_bytes(vector),
                    vector.len() as i64,
                    Utc::now().to_rfc3339(),
                ],
            )?;
        }
        Ok(())
    }

    /// Insert a stored summary, optionally with its embedding
    pub fn insert_summary(&self, summary: &SummaryRecord, embedding: Option<&[f32]>) -> Result<()> {
        let writer = self.writer()?;
        writer.execute(
            "INSERT INTO summaries (id, document_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                summary.id,
                summary.document_id,
                summary.content,
                summary.created_at.to_rfc3339(),
            ],
        )?;
        if let Some(vector) = embedding {
            writer.execute(
                "INSERT INTO summary_embeddings (summary_id, embedding, dimensions, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    summary.id,
                    embedding_to_bytes(vector),
                    vector.len() as i64,
                    Utc::now().to_rfc3339(),
                ],
            )?;
        }
        Ok(())
    }

    // ========================================================================
    // ROW MAPPING
    // ========================================================================

    fn row_to_document(row: &Row<'_>) -> rusqlite::Result<(DocumentRecord, String)> {
        let created_at: String = row.get("created_at")?;
        Ok((
            DocumentRecord {
                id: row.get("id")?,
                title: row.get("title")?,
                summary: row.get("summary")?,
                case_id: row.get("case_id")?,
                analyzed: row.get::<_, i64>("analyzed")? != 0,
                total_articles: row.get("total_articles")?,
                total_chapters: row.get("total_chapters")?,
                total_sections: row.get("total_sections")?,
                table_of_contents: row.get("table_of_contents")?,
                created_at: Utc::now(),
            },
            created_at,
        ))
    }

}

/// Scope filter clause shared by corpus queries; binds case_id then
/// include_library as the last two parameters.
const SCOPE_CLAUSE: &str =
    "((?1 IS NOT NULL AND d.case_id = ?1) OR (?2 != 0 AND d.case_id IS NULL))";

#[async_trait]
impl Datastore for SqliteDatastore {
    async fn passage_vector_search(
        &self,
        scope: &Scope,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPassage>> {
        let reader = self.reader()?;
        let sql = format!(
            "SELECT p.id, p.document_id, d.title AS document_title, p.content, e.embedding
             FROM passages p
             JOIN passage_embeddings e ON e.passage_id = p.id
             JOIN documents d ON d.id = p.document_id
             WHERE {SCOPE_CLAUSE}"
        );
        let mut stmt = reader.prepare(&sql)?;

        let mut hits: Vec<ScoredPassage> = stmt
            .query_map(params![scope.case_id, scope.include_library], |row| {
                let blob: Vec<u8> = row.get("embedding")?;
                Ok(ScoredPassage {
                    id: row.get("id")?,
                    document_id: row.get("document_id")?,
                    document_title: row.get("document_title")?,
                    content: row.get("content")?,
                    score: score_embedding(&blob, query_vector),
                })
            })?
            .filter_map(|r| r.ok())
            .filter(|hit| hit.score > 0.0)
            .collect();

        sort_by_score(&mut hits);
        hits.truncate(limit);
        Ok(hits)
    }

    async fn summary_vector_search(
        &self,
        scope: &Scope,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPassage>> {
        let reader = self.reader()?;
        let sql = format!(
            "SELECT s.id, s.document_id, d.title AS document_title, s.content, e.embedding
             FROM summaries s
             JOIN summary_embeddings e ON e.summary_id = s.id
             JOIN documents d ON d.id = s.document_id
             WHERE {SCOPE_CLAUSE}"
        );
        let mut stmt = reader.prepare(&sql)?;

        let mut hits: Vec<ScoredPassage> = stmt
            .query_map(params![scope.case_id, scope.include_library], |row| {
                let blob: Vec<u8> = row.get("embedding")?;
                Ok(ScoredPassage {
                    id: row.get("id")?,
                    document_id: row.get("document_id")?,
                    document_title: row.get("document_title")?,
                    content: row.get("content")?,
                    score: score_embedding(&blob, query_vector),
                })
            })?
            .filter_map(|r| r.ok())
            .filter(|hit| hit.score > 0.0)
            .collect();

        sort_by_score(&mut hits);
        hits.truncate(limit);
        Ok(hits)
    }

    async fn passage_text_search(
        &self,
        scope: &Scope,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredPassage>> {
        let sanitized = sanitize_fts5_query(query);
        if sanitized.is_empty() {
            return Ok(Vec::new());
        }

        let reader = self.reader()?;
        let sql = format!(
            "SELECT p.id, p.document_id, d.title AS document_title, p.content,
                    bm25(passages_fts) AS rank
             FROM passages_fts fts
             JOIN passages p ON p.rowid = fts.rowid
             JOIN documents d ON d.id = p.document_id
             WHERE passages_fts MATCH ?3 AND {SCOPE_CLAUSE}
             ORDER BY rank
             LIMIT ?4"
        );
        let mut stmt = reader.prepare(&sql)?;

        let hits = stmt
            .query_map(
                params![scope.case_id, scope.include_library, sanitized, limit as i64],
                |row| {
                    // bm25() ranks best-first with negative values
                    let rank: f64 = row.get("rank")?;
                    Ok(ScoredPassage {
                        id: row.get("id")?,
                        document_id: row.get("document_id")?,
                        document_title: row.get("document_title")?,
                        content: row.get("content")?,
                        score: clamp_finite((-rank) as f32),
                    })
                },
            )?
            .filter_map(|r| r.ok())
            .collect();

        Ok(hits)
    }

    async fn documents_matching(
        &self,
        scope: &Scope,
        needle: &str,
        limit: usize,
    ) -> Result<Vec<DocumentRecord>> {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let reader = self.reader()?;
        let sql = format!(
            "SELECT d.* FROM documents d
             WHERE {SCOPE_CLAUSE}
               AND (instr(lower(d.title), ?3) > 0
                    OR instr(lower(COALESCE(d.summary, '')), ?3) > 0)
             ORDER BY d.analyzed DESC, d.created_at ASC
             LIMIT ?4"
        );
        let mut stmt = reader.prepare(&sql)?;

        let rows: Vec<rusqlite::Result<(DocumentRecord, String)>> = stmt
            .query_map(
                params![scope.case_id, scope.include_library, needle, limit as i64],
                |row| Self::row_to_document(row),
            )?
            .collect();

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let (mut doc, created_at) = row?;
            doc.created_at = parse_timestamp(&created_at)?;
            documents.push(doc);
        }
        Ok(documents)
    }

    async fn most_relevant_document(&self, scope: &Scope) -> Result<Option<DocumentRecord>> {
        let reader = self.reader()?;
        let sql = format!(
            "SELECT d.* FROM documents d
             WHERE {SCOPE_CLAUSE}
             ORDER BY (d.case_id IS NULL) ASC, d.analyzed DESC, d.created_at ASC
             LIMIT 1"
        );
        let mut stmt = reader.prepare(&sql)?;

        stmt.query_row(params![scope.case_id, scope.include_library], |row| {
            Self::row_to_document(row)
        })
        .optional()?
        .map(|(mut doc, created_at)| {
            doc.created_at = parse_timestamp(&created_at)?;
            Ok(doc)
        })
        .transpose()
    }

    async fn find_section(
        &self,
        scope: &Scope,
        kind: SectionKind,
        number: &str,
    ) -> Result<Option<SectionRecord>> {
        let reader = self.reader()?;
        let sql = format!(
            "SELECT s.id, s.document_id, s.kind, s.number, s.title, s.content
             FROM document_sections s
             JOIN documents d ON d.id = s.document_id
             WHERE s.kind = ?3 AND s.number = ?4 AND {SCOPE_CLAUSE}
             ORDER BY (d.case_id IS NULL) ASC
             LIMIT 1"
        );
        let mut stmt = reader.prepare(&sql)?;

        let section = stmt
            .query_row(
                params![
                    scope.case_id,
                    scope.include_library,
                    kind.as_str(),
                    number.trim().to_lowercase(),
                ],
                |row| {
                    Ok(SectionRecord {
                        id: row.get("id")?,
                        document_id: row.get("document_id")?,
                        kind,
                        number: row.get("number")?,
                        title: row.get("title")?,
                        content: row.get("content")?,
                    })
                },
            )
            .optional()?;

        Ok(section)
    }

    async fn stored_summary(&self, document_id: &str) -> Result<Option<SummaryRecord>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare(
            "SELECT id, document_id, content, created_at FROM summaries
             WHERE document_id = ?1
             ORDER BY created_at DESC
             LIMIT 1",
        )?;

        let row = stmt
            .query_row(params![document_id], |row| {
                let created_at: String = row.get("created_at")?;
                Ok((
                    SummaryRecord {
                        id: row.get("id")?,
                        document_id: row.get("document_id")?,
                        content: row.get("content")?,
                        created_at: Utc::now(),
                    },
                    created_at,
                ))
            })
            .optional()?;

        row.map(|(mut summary, created_at)| {
            summary.created_at = parse_timestamp(&created_at)?;
            Ok(summary)
        })
        .transpose()
    }

    async fn first_passages(
        &self,
        document_id: &str,
        limit: usize,
    ) -> Result<Vec<PassageRecord>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare(
            "SELECT id, document_id, seq, content FROM passages
             WHERE document_id = ?1
             ORDER BY seq ASC
             LIMIT ?2",
        )?;

        let passages = stmt
            .query_map(params![document_id, limit as i64], |row| {
                Ok(PassageRecord {
                    id: row.get("id")?,
                    document_id: row.get("document_id")?,
                    seq: row.get("seq")?,
                    content: row.get("content")?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(passages)
    }

    async fn cache_fetch(&self, query_hash: &str) -> Result<Option<CacheRecord>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare(
            "SELECT query_hash, query_text, query_type, response_text, source_documents,
                    ttl_seconds, expires_at, hit_count, created_at, last_accessed_at
             FROM query_cache WHERE query_hash = ?1",
        )?;

        let row = stmt
            .query_row(params![query_hash], |row| {
                Ok((
                    CacheRecord {
                        query_hash: row.get("query_hash")?,
                        query_text: row.get("query_text")?,
                        query_type: row.get("query_type")?,
                        response_text: row.get("response_text")?,
                        source_documents: row.get("source_documents")?,
                        ttl_seconds: row.get("ttl_seconds")?,
                        expires_at: Utc::now(),
                        hit_count: row.get("hit_count")?,
                        created_at: Utc::now(),
                        last_accessed_at: Utc::now(),
                    },
                    row.get::<_, String>("expires_at")?,
                    row.get::<_, String>("created_at")?,
                    row.get::<_, String>("last_accessed_at")?,
                ))
            })
            .optional()?;

        row.map(|(mut record, expires_at, created_at, last_accessed_at)| {
            record.expires_at = parse_timestamp(&expires_at)?;
            record.created_at = parse_timestamp(&created_at)?;
            record.last_accessed_at = parse_timestamp(&last_accessed_at)?;
            Ok(record)
        })
        .transpose()
    }

    async fn cache_touch(&self, query_hash: &str) -> Result<()> {
        let writer = self.writer()?;
        // SQL-level increment keeps the counter monotonic under races
        writer.execute(
            "UPDATE query_cache
             SET hit_count = hit_count + 1, last_accessed_at = ?2
             WHERE query_hash = ?1",
            params![query_hash, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    async fn cache_upsert(&self, record: &CacheRecord) -> Result<()> {
        let writer = self.writer()?;
        writer.execute(
            "INSERT INTO query_cache (
                query_hash, query_text, query_type, response_text, source_documents,
                ttl_seconds, expires_at, hit_count, created_at, last_accessed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(query_hash) DO UPDATE SET
                query_type = excluded.query_type,
                response_text = excluded.response_text,
                source_documents = excluded.source_documents,
                ttl_seconds = excluded.ttl_seconds,
                expires_at = excluded.expires_at,
                hit_count = query_cache.hit_count + 1,
                last_accessed_at = excluded.last_accessed_at",
            params![
                record.query_hash,
                record.query_text,
                record.query_type,
                record.response_text,
                record.source_documents,
                record.ttl_seconds,
                record.expires_at.to_rfc3339(),
                record.hit_count,
                record.created_at.to_rfc3339(),
                record.last_accessed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Encode an embedding as little-endian f32 bytes
fn embedding_to_bytes(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode little-endian f32 bytes back into an embedding
fn embedding_from_bytes(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

/// Cosine score of a stored blob against the query vector, clamped finite
fn score_embedding(blob: &[u8], query_vector: &[f32]) -> f32 {
    match embedding_from_bytes(blob) {
        Some(stored) => clamp_finite(cosine_similarity(query_vector, &stored)),
        None => 0.0,
    }
}

/// Replace NaN/infinite scores with 0.0
fn clamp_finite(score: f32) -> f32 {
    if score.is_finite() { score } else { 0.0 }
}

fn sort_by_score(hits: &mut [ScoredPassage]) {
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StorageError::InvalidTimestamp(value.to_string()))
}

/// Strip FTS5 operators from a user query, quoting each remaining token.
///
/// FTS5 treats characters like `"`, `-` and `*` as syntax; a raw user query
/// can otherwise produce a parse error instead of a search. Tokens are
/// OR-joined: bm25 ranking rewards multi-term matches without demanding
/// that every word of a natural-language question appear in a passage.
fn sanitize_fts5_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|token| {
            token
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
        })
        .filter(|token| !token.is_empty())
        .map(|token| format!("\"{token}\""))
        .collect::<Vec<_>>()
        .join(" OR ")
}

// ============================================================================
// TESTS
// ============================================================================
