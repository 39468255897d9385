//! Routing journeys against a seeded corpus.

use std::sync::Arc;

use lexrag_core::{QueryType, Scope, SourceType};
use tempfile::TempDir;

use lexrag_e2e_tests::harness::{
    build_router, open_store, seed_constitution, seed_unanalyzed_document, ARTICLE_76_TEXT,
    CONSTITUTION_SUMMARY,
};
use lexrag_e2e_tests::mocks::CannedCompletion;

const CANNED_ANSWER: &str = "Respuesta sintetizada de prueba.";

#[tokio::test]
async fn metadata_query_answers_from_structural_counts() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed_constitution(&store);
    let router = build_router(store, Arc::new(CannedCompletion::new(CANNED_ANSWER)));

    let response = router
        .route("¿Cuántos artículos tiene la Constitución?", &Scope::library())
        .await;

    assert_eq!(response.query_type, QueryType::Metadata);
    assert!(response.confidence >= 0.6);
    assert!(response.answer.contains("444"));
    assert!(!response.from_cache);
    assert!(response.strategies.contains(&"metadata_search".to_string()));
    assert_eq!(response.sources.len(), 1);
}

#[tokio::test]
async fn navigation_query_returns_article_verbatim() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed_constitution(&store);
    let completion = Arc::new(CannedCompletion::new(CANNED_ANSWER));
    let router = build_router(store, completion.clone());

    let response = router.route("Artículo 76", &Scope::library()).await;

    assert_eq!(response.query_type, QueryType::Navigation);
    assert_eq!(response.confidence, 1.0);
    assert_eq!(response.answer, ARTICLE_76_TEXT);
    assert!(response
        .strategies
        .contains(&"direct_article_lookup".to_string()));
    assert_eq!(response.sources[0].id, "sec-76");
    // A direct lookup never calls the completion service
    assert_eq!(completion.call_count(), 0);
}

#[tokio::test]
async fn navigation_miss_falls_through_to_content() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed_constitution(&store);
    let router = build_router(store, Arc::new(CannedCompletion::new(CANNED_ANSWER)));

    // No article 999 in the corpus; hybrid content retrieval takes over
    let response = router
        .route("¿Qué dice el artículo 999?", &Scope::library())
        .await;

    assert_eq!(response.query_type, QueryType::Navigation);
    assert!(response.confidence < 1.0);
    assert_eq!(response.answer, CANNED_ANSWER);
}

#[tokio::test]
async fn content_query_synthesizes_from_fused_passages() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed_constitution(&store);
    let completion = Arc::new(CannedCompletion::new(CANNED_ANSWER));
    let router = build_router(store, completion.clone());

    let response = router
        .route("¿Qué garantías incluye el debido proceso?", &Scope::library())
        .await;

    assert_eq!(response.query_type, QueryType::Content);
    assert_eq!(response.answer, CANNED_ANSWER);
    assert!(!response.sources.is_empty());
    assert!(response.sources.len() <= 5);
    assert!(response.confidence > 0.7);
    assert_eq!(completion.call_count(), 1);
}

#[tokio::test]
async fn summary_query_prefers_stored_summary() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed_constitution(&store);
    let completion = Arc::new(CannedCompletion::new(CANNED_ANSWER));
    let router = build_router(store, completion.clone());

    let response = router
        .route("Dame un resumen de la constitución", &Scope::library())
        .await;

    assert_eq!(response.query_type, QueryType::Summary);
    assert_eq!(response.answer, CONSTITUTION_SUMMARY);
    assert_eq!(response.sources[0].source_type, SourceType::Summary);
    assert_eq!(response.confidence, 0.9);
    // Stored summaries short-circuit synthesis
    assert_eq!(completion.call_count(), 0);
}

#[tokio::test]
async fn summary_generated_when_none_stored() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed_unanalyzed_document(&store);
    let completion = Arc::new(CannedCompletion::new(CANNED_ANSWER));
    let router = build_router(store, completion.clone());

    let response = router
        .route("resumen de la ley de aguas", &Scope::library())
        .await;

    assert_eq!(response.query_type, QueryType::Summary);
    assert_eq!(response.answer, CANNED_ANSWER);
    // On-the-fly summaries carry lower confidence than stored ones
    assert!((response.confidence - 0.8).abs() < 1e-6);
    assert_eq!(completion.call_count(), 1);
}

#[tokio::test]
async fn comparison_query_resolves_both_articles() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed_constitution(&store);
    let completion = Arc::new(CannedCompletion::new(CANNED_ANSWER));
    let router = build_router(store, completion.clone());

    let response = router
        .route("Compara el artículo 10 con el artículo 20", &Scope::library())
        .await;

    assert_eq!(response.query_type, QueryType::Comparison);
    assert_eq!(response.answer, CANNED_ANSWER);
    assert_eq!(response.sources.len(), 2);
    assert!(response.confidence > 0.7);
    assert_eq!(completion.call_count(), 1);
}

#[tokio::test]
async fn metadata_query_on_unanalyzed_document_returns_placeholder() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed_unanalyzed_document(&store);
    let router = build_router(store.clone(), Arc::new(CannedCompletion::new(CANNED_ANSWER)));

    let response = router
        .route("¿Cuántos artículos tiene la ley de aguas?", &Scope::library())
        .await;

    assert_eq!(response.query_type, QueryType::Metadata);
    assert!(response.answer.contains("aún no ha sido analizado"));
    assert!((response.confidence - 0.5).abs() < 1e-6);
}

#[tokio::test]
async fn case_scope_excludes_other_cases() {
    use chrono::Utc;
    use lexrag_core::DocumentRecord;

    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store
        .upsert_document(&DocumentRecord {
            id: "otro-caso".to_string(),
            title: "Contrato del caso ajeno".to_string(),
            summary: Some("Contrato de arrendamiento".to_string()),
            case_id: Some("case-xyz".to_string()),
            analyzed: true,
            total_articles: Some(12),
            total_chapters: None,
            total_sections: None,
            table_of_contents: None,
            created_at: Utc::now(),
        })
        .unwrap();
    let router = build_router(store, Arc::new(CannedCompletion::new(CANNED_ANSWER)));

    // Library-only scope cannot see case-attached documents
    let response = router
        .route("¿Cuántos artículos tiene el contrato?", &Scope::library())
        .await;

    assert!(!response.answer.contains("12"));
    assert!(response.confidence <= 0.5);
}
