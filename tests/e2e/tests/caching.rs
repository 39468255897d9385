//! Response cache behavior through the full routing path.

use std::sync::Arc;

use lexrag_core::{
    query_hash, CacheConfig, Datastore, QueryType, ResponseCache, RouteResponse, RouterConfig,
    Scope,
};
use tempfile::TempDir;

use lexrag_e2e_tests::harness::{
    build_router, build_router_with_config, open_store, seed_constitution,
};
use lexrag_e2e_tests::mocks::CannedCompletion;

const CANNED_ANSWER: &str = "Respuesta sintetizada de prueba.";

#[tokio::test]
async fn identical_query_twice_hits_cache() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed_constitution(&store);
    let router = build_router(store, Arc::new(CannedCompletion::new(CANNED_ANSWER)));

    let first = router.route("Artículo 76", &Scope::library()).await;
    let second = router.route("Artículo 76", &Scope::library()).await;

    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(second.answer, first.answer);
    assert_eq!(second.confidence, 1.0);
    assert_eq!(second.query_type, QueryType::Navigation);
}

#[tokio::test]
async fn normalization_insensitive_cache_key() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed_constitution(&store);
    let router = build_router(store, Arc::new(CannedCompletion::new(CANNED_ANSWER)));

    let first = router.route("Artículo 76", &Scope::library()).await;
    // Different casing and spacing, same normalized query
    let second = router.route("  ARTÍCULO    76 ", &Scope::library()).await;

    assert!(second.from_cache);
    assert_eq!(second.answer, first.answer);
}

#[tokio::test]
async fn cache_hits_increment_hit_count() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed_constitution(&store);
    let router = build_router(store.clone(), Arc::new(CannedCompletion::new(CANNED_ANSWER)));

    router.route("Artículo 76", &Scope::library()).await;
    let hash = query_hash("Artículo 76");
    let stored = store.cache_fetch(&hash).await.unwrap().unwrap();
    assert_eq!(stored.hit_count, 0);

    router.route("Artículo 76", &Scope::library()).await;
    let after_one_hit = store.cache_fetch(&hash).await.unwrap().unwrap();
    assert_eq!(after_one_hit.hit_count, 1);

    router.route("Artículo 76", &Scope::library()).await;
    let after_two_hits = store.cache_fetch(&hash).await.unwrap().unwrap();
    assert_eq!(after_two_hits.hit_count, 2);
    assert!(after_two_hits.last_accessed_at >= stored.last_accessed_at);
}

#[tokio::test]
async fn low_confidence_responses_are_not_cached() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let router = build_router(store.clone(), Arc::new(CannedCompletion::new(CANNED_ANSWER)));

    // Empty corpus: the hybrid handler returns its low-confidence fallback
    let response = router.route("zzz sin sentido", &Scope::library()).await;
    assert!(response.confidence < 0.3);

    let stored = store.cache_fetch(&query_hash("zzz sin sentido")).await.unwrap();
    assert!(stored.is_none());
}

#[tokio::test]
async fn expired_entries_are_recomputed() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed_constitution(&store);

    let config = RouterConfig {
        cache: CacheConfig {
            ttl_seconds: 0,
            ..CacheConfig::default()
        },
        ..RouterConfig::default()
    };
    let router = build_router_with_config(
        store,
        Arc::new(CannedCompletion::new(CANNED_ANSWER)),
        config,
    );

    let first = router.route("Artículo 76", &Scope::library()).await;
    // Zero TTL: the stored entry is already expired at read time
    let second = router.route("Artículo 76", &Scope::library()).await;

    assert!(!first.from_cache);
    assert!(!second.from_cache);
    assert_eq!(second.answer, first.answer);
}

#[tokio::test]
async fn direct_store_then_lookup_round_trips() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let cache = ResponseCache::new(store.clone(), CacheConfig::default());

    let response = RouteResponse {
        answer: "Respuesta de alta confianza.".to_string(),
        sources: Vec::new(),
        confidence: 0.9,
        from_cache: false,
        query_type: QueryType::Content,
        strategies: vec!["semantic_search".to_string()],
    };

    cache.store("¿qué es el debido proceso?", &response).await;
    let hit = cache.lookup("¿qué es el debido proceso?").await.unwrap();

    assert!(hit.from_cache);
    assert_eq!(hit.confidence, 1.0);
    assert_eq!(hit.answer, response.answer);
    assert_eq!(hit.query_type, QueryType::Content);
}

#[tokio::test]
async fn threshold_confidence_is_not_cached() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let cache = ResponseCache::new(store.clone(), CacheConfig::default());

    let response = RouteResponse {
        answer: "Respuesta justa en el umbral.".to_string(),
        sources: Vec::new(),
        confidence: 0.7,
        from_cache: false,
        query_type: QueryType::Content,
        strategies: Vec::new(),
    };

    // Strictly-greater-than threshold: 0.7 itself is not cacheable
    cache.store("consulta en el umbral", &response).await;
    assert!(cache.lookup("consulta en el umbral").await.is_none());
}
