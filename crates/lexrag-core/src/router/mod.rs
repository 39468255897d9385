//! Query Router
//!
//! The engine's entry point: `route(query, scope)`. Control flow is
//! cache lookup -> classify -> dispatch to the strategy handler for the
//! classified intent -> conditionally cache -> return.
//!
//! Routing never errors. Every collaborator failure along the way degrades
//! confidence or answer quality but always produces a well-formed
//! `RouteResponse`.

mod handlers;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::{CacheConfig, ResponseCache};
use crate::query::{ClassifierConfig, QueryClassifier, QueryType};
use crate::retrieval::{
    FusionConfig, KeywordRetriever, MetadataRetriever, RetrievalConfig, SearchResult,
    SemanticRetriever, SummaryRetriever,
};
use crate::services::{CompletionService, EmbeddingService, QueryEmbedder};
use crate::storage::{Datastore, Scope};
use crate::synthesis::{SynthesisConfig, Synthesizer};

// ============================================================================
// RESPONSE
// ============================================================================

/// The engine's output contract
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResponse {
    /// Synthesized natural-language answer
    pub answer: String,
    /// Cited sources, best first
    pub sources: Vec<SearchResult>,
    /// Overall confidence, 0.0 - 1.0
    pub confidence: f32,
    pub from_cache: bool,
    /// Classified intent, for observability
    pub query_type: QueryType,
    /// Strategy names the classification required
    pub strategies: Vec<String>,
}

// ============================================================================
// CONFIG
// ============================================================================

/// Aggregated engine configuration
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub retrieval: RetrievalConfig,
    pub fusion: FusionConfig,
    pub synthesis: SynthesisConfig,
    pub cache: CacheConfig,
    pub classifier: ClassifierConfig,
    /// Whether classification asks the completion service for intent hints
    pub intent_hints: bool,
    /// Maximum cited sources in a response
    pub max_sources: usize,
    /// Fused results that feed the synthesis context
    pub context_passages: usize,
    /// Passages used to generate a summary when none is stored
    pub summary_passages: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            retrieval: RetrievalConfig::default(),
            fusion: FusionConfig::default(),
            synthesis: SynthesisConfig::default(),
            cache: CacheConfig::default(),
            classifier: ClassifierConfig::default(),
            intent_hints: false,
            max_sources: 5,
            context_passages: 5,
            summary_passages: 10,
        }
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Query routing and hybrid retrieval engine.
///
/// All collaborators are injected: the datastore, the embedding service and
/// the completion service arrive as handles, so tests can substitute fakes.
pub struct QueryRouter {
    classifier: QueryClassifier,
    semantic: SemanticRetriever,
    keyword: KeywordRetriever,
    metadata: MetadataRetriever,
    summary: SummaryRetriever,
    synthesizer: Synthesizer,
    cache: ResponseCache,
    datastore: Arc<dyn Datastore>,
    config: RouterConfig,
}

impl QueryRouter {
    /// Build a router from its collaborator handles.
    pub fn new(
        datastore: Arc<dyn Datastore>,
        embedding: Arc<dyn EmbeddingService>,
        completion: Arc<dyn CompletionService>,
        config: RouterConfig,
    ) -> Self {
        let embedder = Arc::new(QueryEmbedder::new(embedding));

        let classifier = if config.intent_hints {
            QueryClassifier::with_intent_hints(completion.clone(), config.classifier.clone())
        } else {
            QueryClassifier::new()
        };

        Self {
            classifier,
            semantic: SemanticRetriever::new(
                datastore.clone(),
                embedder.clone(),
                config.retrieval.clone(),
            ),
            keyword: KeywordRetriever::new(datastore.clone(), config.retrieval.clone()),
            metadata: MetadataRetriever::new(datastore.clone(), config.retrieval.clone()),
            summary: SummaryRetriever::new(datastore.clone(), embedder, config.retrieval.clone()),
            synthesizer: Synthesizer::new(completion, config.synthesis.clone()),
            cache: ResponseCache::new(datastore.clone(), config.cache.clone()),
            datastore,
            config,
        }
    }

    /// Answer a natural-language query against the scoped corpus.
    pub async fn route(&self, query: &str, scope: &Scope) -> RouteResponse {
        if let Some(hit) = self.cache.lookup(query).await {
            debug!(query, "answered from cache");
            return hit;
        }

        let classification = self.classifier.classify(query).await;
        debug!(
            query_type = %classification.query_type,
            confidence = classification.confidence,
            "dispatching query"
        );

        let mut response = match classification.query_type {
            QueryType::Metadata => self.handle_metadata(query, &classification, scope).await,
            QueryType::Navigation => self.handle_navigation(query, &classification, scope).await,
            QueryType::Content => self.handle_content(query, &classification, scope).await,
            QueryType::Comparison => self.handle_comparison(query, &classification, scope).await,
            QueryType::Summary => self.handle_summary(query, &classification, scope).await,
            QueryType::Unknown => self.handle_hybrid(query, &classification, scope).await,
        };

        response.query_type = classification.query_type;
        response.strategies = classification
            .required_strategies
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        response.confidence = response.confidence.clamp(0.0, 1.0);
        response.sources.truncate(self.config.max_sources);

        self.cache.store(query, &response).await;
        response
    }
}
