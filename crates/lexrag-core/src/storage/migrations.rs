//! Database Migrations
//!
//! Schema migration definitions for the storage layer.

/// Migration definitions
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial corpus schema: documents, sections, passages, summaries, FTS5",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "Response cache keyed by normalized-query hash",
        up: MIGRATION_V2_UP,
    },
    Migration {
        version: 3,
        description: "Structural metadata columns for instant document answers",
        up: MIGRATION_V3_UP,
    },
];

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version number
    pub version: u32,
    /// Description
    pub description: &'static str,
    /// SQL to apply
    pub up: &'static str,
}

/// V1: Initial corpus schema
const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    summary TEXT,
    case_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_case ON documents(case_id);

CREATE TABLE IF NOT EXISTS document_sections (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    number TEXT NOT NULL,
    title TEXT,
    content TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sections_document ON document_sections(document_id);
CREATE INDEX IF NOT EXISTS idx_sections_kind_number ON document_sections(kind, number);

CREATE TABLE IF NOT EXISTS passages (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    section_id TEXT REFERENCES document_sections(id) ON DELETE SET NULL,
    seq INTEGER NOT NULL DEFAULT 0,
    content TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_passages_document ON passages(document_id, seq);

-- Embeddings storage (binary blob, f32 little-endian)
CREATE TABLE IF NOT EXISTS passage_embeddings (
    passage_id TEXT PRIMARY KEY REFERENCES passages(id) ON DELETE CASCADE,
    embedding BLOB NOT NULL,
    dimensions INTEGER NOT NULL,
    model TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS summaries (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_summaries_document ON summaries(document_id);

CREATE TABLE IF NOT EXISTS summary_embeddings (
    summary_id TEXT PRIMARY KEY REFERENCES summaries(id) ON DELETE CASCADE,
    embedding BLOB NOT NULL,
    dimensions INTEGER NOT NULL,
    model TEXT,
    created_at TEXT NOT NULL
);

-- FTS5 virtual table for full-text passage search
CREATE VIRTUAL TABLE IF NOT EXISTS passages_fts USING fts5(
    id,
    content,
    content='passages',
    content_rowid='rowid'
);

-- Triggers to keep FTS in sync
CREATE TRIGGER IF NOT EXISTS passages_ai AFTER INSERT ON passages BEGIN
    INSERT INTO passages_fts(rowid, id, content)
    VALUES (NEW.rowid, NEW.id, NEW.content);
END;

CREATE TRIGGER IF NOT EXISTS passages_ad AFTER DELETE ON passages BEGIN
    INSERT INTO passages_fts(passages_fts, rowid, id, content)
    VALUES ('delete', OLD.rowid, OLD.id, OLD.content);
END;

CREATE TRIGGER IF NOT EXISTS passages_au AFTER UPDATE ON passages BEGIN
    INSERT INTO passages_fts(passages_fts, rowid, id, content)
    VALUES ('delete', OLD.rowid, OLD.id, OLD.content);
    INSERT INTO passages_fts(rowid, id, content)
    VALUES (NEW.rowid, NEW.id, NEW.content);
END;

-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, datetime('now'));
"#;

/// V2: Response cache
const MIGRATION_V2_UP: &str = r#"
CREATE TABLE IF NOT EXISTS query_cache (
    query_hash TEXT PRIMARY KEY,
    query_text TEXT NOT NULL,
    query_type TEXT NOT NULL,
    response_text TEXT NOT NULL,
    source_documents TEXT NOT NULL DEFAULT '[]',
    ttl_seconds INTEGER NOT NULL,
    expires_at TEXT NOT NULL,
    hit_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    last_accessed_at TEXT NOT NULL
);

-- Expired rows are swept by an external housekeeping job
CREATE INDEX IF NOT EXISTS idx_cache_expires ON query_cache(expires_at);

UPDATE schema_version SET version = 2, applied_at = datetime('now');
"#;

/// V3: Structural metadata on documents
const MIGRATION_V3_UP: &str = r#"
ALTER TABLE documents ADD COLUMN analyzed INTEGER NOT NULL DEFAULT 0;
ALTER TABLE documents ADD COLUMN total_articles INTEGER;
ALTER TABLE documents ADD COLUMN total_chapters INTEGER;
ALTER TABLE documents ADD COLUMN total_sections INTEGER;
ALTER TABLE documents ADD COLUMN table_of_contents TEXT;

CREATE INDEX IF NOT EXISTS idx_documents_analyzed ON documents(analyzed);

UPDATE schema_version SET version = 3, applied_at = datetime('now');
"#;

/// Get current schema version from database
pub fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .or(Ok(0))
}

/// Apply pending migrations
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current_version = get_current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                "Applying migration v{}: {}",
                migration.version,
                migration.description
            );

            // execute_batch handles multi-statement SQL including triggers
            conn.execute_batch(migration.up)?;
            applied += 1;
        }
    }

    Ok(applied)
}
