//! Corpus Harness
//!
//! Seeds a temporary SQLite datastore with a small legal corpus and builds
//! routers wired to the service fakes.

use std::sync::Arc;

use chrono::Utc;
use lexrag_core::{
    CompletionService, DocumentRecord, PassageRecord, QueryRouter, RouterConfig, SectionKind,
    SectionRecord, SqliteDatastore, SummaryRecord,
};
use tempfile::TempDir;

use crate::mocks::{hash_embedding, HashEmbedder, TEST_EMBEDDING_DIMS};

// ============================================================================
// FIXTURE TEXT
// ============================================================================

pub const CONSTITUTION_TITLE: &str = "Constitución de la República";

pub const ARTICLE_76_TEXT: &str = "Art. 76.- En todo proceso en el que se determinen derechos \
     y obligaciones de cualquier orden, se asegurará el derecho al debido proceso, que incluirá \
     garantías básicas de defensa y motivación.";

pub const ARTICLE_10_TEXT: &str = "Art. 10.- Las personas, comunidades, pueblos y \
     nacionalidades son titulares de los derechos garantizados en esta norma.";

pub const ARTICLE_20_TEXT: &str = "Art. 20.- Las instituciones públicas responderán por los \
     daños causados por la deficiente prestación de servicios.";

pub const CONSTITUTION_SUMMARY: &str = "Resumen ejecutivo: la norma suprema establece derechos, \
     garantías y la organización del Estado en 444 artículos.";

// ============================================================================
// STORE AND ROUTER BUILDERS
// ============================================================================

/// Open a fresh datastore inside a temp dir
pub fn open_store(dir: &TempDir) -> Arc<SqliteDatastore> {
    Arc::new(SqliteDatastore::open(&dir.path().join("corpus.db")).expect("datastore opens"))
}

/// Build a router over the store with the hashing embedder and the given
/// completion fake.
pub fn build_router(
    store: Arc<SqliteDatastore>,
    completion: Arc<dyn CompletionService>,
) -> QueryRouter {
    build_router_with_config(store, completion, RouterConfig::default())
}

pub fn build_router_with_config(
    store: Arc<SqliteDatastore>,
    completion: Arc<dyn CompletionService>,
    config: RouterConfig,
) -> QueryRouter {
    QueryRouter::new(store, Arc::new(HashEmbedder::default()), completion, config)
}

// ============================================================================
// SEEDING
// ============================================================================

fn embed(text: &str) -> Vec<f32> {
    hash_embedding(text, TEST_EMBEDDING_DIMS)
}

/// Seed the constitution fixture: analyzed document with structural counts,
/// three articles, embedded passages and a stored executive summary.
pub fn seed_constitution(store: &SqliteDatastore) {
    let now = Utc::now();
    store
        .upsert_document(&DocumentRecord {
            id: "const-1".to_string(),
            title: CONSTITUTION_TITLE.to_string(),
            summary: Some("Norma suprema del ordenamiento jurídico.".to_string()),
            case_id: None,
            analyzed: true,
            total_articles: Some(444),
            total_chapters: Some(9),
            total_sections: None,
            table_of_contents: Some(
                "Título I: Elementos constitutivos del Estado\nTítulo II: Derechos".to_string(),
            ),
            created_at: now,
        })
        .expect("document inserts");

    for (id, number, content) in [
        ("sec-10", "10", ARTICLE_10_TEXT),
        ("sec-20", "20", ARTICLE_20_TEXT),
        ("sec-76", "76", ARTICLE_76_TEXT),
    ] {
        store
            .insert_section(&SectionRecord {
                id: id.to_string(),
                document_id: "const-1".to_string(),
                kind: SectionKind::Article,
                number: number.to_string(),
                title: None,
                content: content.to_string(),
            })
            .expect("section inserts");
    }

    for (i, (id, content)) in [
        ("pas-1", ARTICLE_76_TEXT),
        ("pas-2", ARTICLE_10_TEXT),
        ("pas-3", ARTICLE_20_TEXT),
        (
            "pas-4",
            "Las garantías jurisdiccionales protegen los derechos reconocidos en la norma.",
        ),
    ]
    .into_iter()
    .enumerate()
    {
        store
            .insert_passage(
                &PassageRecord {
                    id: id.to_string(),
                    document_id: "const-1".to_string(),
                    seq: i as i64,
                    content: content.to_string(),
                },
                Some(&embed(content)),
            )
            .expect("passage inserts");
    }

    store
        .insert_summary(
            &SummaryRecord {
                id: "sum-1".to_string(),
                document_id: "const-1".to_string(),
                content: CONSTITUTION_SUMMARY.to_string(),
                created_at: now,
            },
            Some(&embed(CONSTITUTION_SUMMARY)),
        )
        .expect("summary inserts");
}

/// Seed a document that has passages but no analysis and no stored summary
pub fn seed_unanalyzed_document(store: &SqliteDatastore) {
    store
        .upsert_document(&DocumentRecord {
            id: "ley-aguas".to_string(),
            title: "Ley de Aguas".to_string(),
            summary: None,
            case_id: None,
            analyzed: false,
            total_articles: None,
            total_chapters: None,
            total_sections: None,
            table_of_contents: None,
            created_at: Utc::now(),
        })
        .expect("document inserts");

    for (i, (id, content)) in [
        (
            "aguas-1",
            "La presente ley regula el aprovechamiento de los recursos hídricos.",
        ),
        (
            "aguas-2",
            "El uso del agua para consumo humano tiene prioridad sobre otros usos.",
        ),
    ]
    .into_iter()
    .enumerate()
    {
        store
            .insert_passage(
                &PassageRecord {
                    id: id.to_string(),
                    document_id: "ley-aguas".to_string(),
                    seq: i as i64,
                    content: content.to_string(),
                },
                Some(&embed(content)),
            )
            .expect("passage inserts");
    }
}
