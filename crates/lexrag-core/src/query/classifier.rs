//! Query Intent Classification
//!
//! Weighted pattern voting over a declarative `(category, pattern, weight)`
//! table. Adding an intent category is a data change, not a control-flow
//! change. A completion-service intent hint can enrich the result but is
//! advisory only: it runs best-effort under a short timeout and never
//! participates in routing decisions.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::query::{extract_entities, normalize_query, EntityType, QueryEntity};
use crate::services::CompletionService;

// ============================================================================
// QUERY TYPES
// ============================================================================

/// Intent categories for incoming queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    /// Questions about document structure (counts, tables of contents)
    Metadata,
    /// Requests for a specific article, chapter or section
    Navigation,
    /// Substantive questions answered from passage content
    Content,
    /// Requests to contrast two or more provisions or laws
    Comparison,
    /// Requests for a document overview
    Summary,
    /// No category won the vote
    #[default]
    Unknown,
}

impl QueryType {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Metadata => "metadata",
            QueryType::Navigation => "navigation",
            QueryType::Content => "content",
            QueryType::Comparison => "comparison",
            QueryType::Summary => "summary",
            QueryType::Unknown => "unknown",
        }
    }

    /// Parse from string name
    pub fn parse_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "metadata" => QueryType::Metadata,
            "navigation" => QueryType::Navigation,
            "content" => QueryType::Content,
            "comparison" => QueryType::Comparison,
            "summary" => QueryType::Summary,
            _ => QueryType::Unknown,
        }
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// RETRIEVAL STRATEGIES
// ============================================================================

/// Retrieval strategies a handler is expected to invoke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    MetadataSearch,
    DocumentSummary,
    StructureSearch,
    DirectArticleLookup,
    SemanticSearch,
    KeywordSearch,
    SummarySearch,
}

impl RetrievalStrategy {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalStrategy::MetadataSearch => "metadata_search",
            RetrievalStrategy::DocumentSummary => "document_summary",
            RetrievalStrategy::StructureSearch => "structure_search",
            RetrievalStrategy::DirectArticleLookup => "direct_article_lookup",
            RetrievalStrategy::SemanticSearch => "semantic_search",
            RetrievalStrategy::KeywordSearch => "keyword_search",
            RetrievalStrategy::SummarySearch => "summary_search",
        }
    }
}

// ============================================================================
// INTENT HINT
// ============================================================================

/// One-word intent label suggested by the completion service.
///
/// Parsed defensively into a closed set; anything unexpected becomes
/// `Unrecognized`. Enrichment only - routing never branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentHint {
    Lookup,
    Explain,
    Compare,
    Summarize,
    Navigate,
    Count,
    Unrecognized,
}

impl IntentHint {
    /// Parse a free-text label from the completion service
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "lookup" => IntentHint::Lookup,
            "explain" => IntentHint::Explain,
            "compare" => IntentHint::Compare,
            "summarize" => IntentHint::Summarize,
            "navigate" => IntentHint::Navigate,
            "count" => IntentHint::Count,
            _ => IntentHint::Unrecognized,
        }
    }
}

// ============================================================================
// CLASSIFICATION RESULT
// ============================================================================

/// The result of classifying one query
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryClassification {
    /// Winning intent category
    #[serde(rename = "type")]
    pub query_type: QueryType,
    /// Confidence in the classification, 0.0 - 1.0
    pub confidence: f32,
    /// Structured mentions found in the query, in order of occurrence
    pub entities: Vec<QueryEntity>,
    /// Advisory intent label from the completion service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<IntentHint>,
    /// Strategies the dispatched handler must invoke
    pub required_strategies: Vec<RetrievalStrategy>,
    /// Lowercased, whitespace-collapsed query text (cache key seed)
    pub normalized_query: String,
}

// ============================================================================
// PATTERN TABLE
// ============================================================================

/// One voting pattern: category, lexical pattern, vote weight
struct IntentPattern {
    query_type: QueryType,
    pattern: &'static str,
    weight: f32,
}

const INTENT_PATTERNS: &[IntentPattern] = &[
    // Metadata - structure and counting questions
    IntentPattern { query_type: QueryType::Metadata, pattern: r"cu[áa]nt[oa]s?\s+(?:art[íi]culos|cap[íi]tulos|secciones|t[íi]tulos|disposiciones)", weight: 1.0 },
    IntentPattern { query_type: QueryType::Metadata, pattern: r"\bcu[áa]nt[oa]s?\b", weight: 1.0 },
    IntentPattern { query_type: QueryType::Metadata, pattern: r"\bhow\s+many\b", weight: 1.0 },
    IntentPattern { query_type: QueryType::Metadata, pattern: r"\b(?:estructura|[íi]ndice|tabla\s+de\s+contenidos?)\b", weight: 1.0 },
    IntentPattern { query_type: QueryType::Metadata, pattern: r"\btotal\s+de\b", weight: 1.0 },
    // Navigation - requests for a specific provision
    IntentPattern { query_type: QueryType::Navigation, pattern: r"\bart(?:[íi]culo|\.)\s*\d+", weight: 1.0 },
    IntentPattern { query_type: QueryType::Navigation, pattern: r"\bcap(?:[íi]tulo|\.)\s*(?:\d+|[mdclxvi]+)\b", weight: 1.0 },
    IntentPattern { query_type: QueryType::Navigation, pattern: r"\bsecci[óo]n\s+(?:\d+|[mdclxvi]+)\b", weight: 1.0 },
    IntentPattern { query_type: QueryType::Navigation, pattern: r"\bqu[ée]\s+(?:dice|establece|dispone)\b", weight: 1.0 },
    IntentPattern { query_type: QueryType::Navigation, pattern: r"\b(?:mu[ée]strame|busca|encuentra|ubica)\b", weight: 1.0 },
    IntentPattern { query_type: QueryType::Navigation, pattern: r"\bd[óo]nde\s+(?:est[áa]|dice|se\s+regula)\b", weight: 1.0 },
    // Content - substantive questions
    IntentPattern { query_type: QueryType::Content, pattern: r"\b(?:qu[ée]|c[óo]mo|cu[áa]l(?:es)?|por\s+qu[ée])\b", weight: 1.0 },
    IntentPattern { query_type: QueryType::Content, pattern: r"\bexpl[íi]ca(?:me)?\b", weight: 1.0 },
    IntentPattern { query_type: QueryType::Content, pattern: r"\b(?:what|how|why|explain)\b", weight: 1.0 },
    IntentPattern { query_type: QueryType::Content, pattern: r"\b(?:derechos?|obligaci[óo]n(?:es)?|requisitos?|procedimientos?|sanci[óo]n(?:es)?|garant[íi]as?)\b", weight: 1.0 },
    IntentPattern { query_type: QueryType::Content, pattern: r"\bsignifica\b", weight: 1.0 },
    // Comparison - contrasting provisions
    IntentPattern { query_type: QueryType::Comparison, pattern: r"\b(?:diferencias?|semejanzas?|versus|vs\.?)\b", weight: 1.0 },
    IntentPattern { query_type: QueryType::Comparison, pattern: r"\bcompara(?:r|ci[óo]n)?\b", weight: 2.0 },
    IntentPattern { query_type: QueryType::Comparison, pattern: r"\bentre\b.+\by\b", weight: 1.0 },
    IntentPattern { query_type: QueryType::Comparison, pattern: r"\b(?:difference|compare)\b", weight: 1.0 },
    // Summary - document overviews
    IntentPattern { query_type: QueryType::Summary, pattern: r"\bres[úu]m(?:en|e|eme)\b", weight: 1.0 },
    IntentPattern { query_type: QueryType::Summary, pattern: r"\bde\s+qu[ée]\s+trata\b", weight: 2.0 },
    IntentPattern { query_type: QueryType::Summary, pattern: r"\b(?:s[íi]ntesis|visi[óo]n\s+general)\b", weight: 1.0 },
    IntentPattern { query_type: QueryType::Summary, pattern: r"\bsummar(?:y|ize)\b", weight: 1.0 },
];

static COMPILED_PATTERNS: LazyLock<Vec<(QueryType, Regex, f32)>> = LazyLock::new(|| {
    INTENT_PATTERNS
        .iter()
        .map(|p| {
            (
                p.query_type,
                Regex::new(p.pattern).expect("intent pattern is valid"),
                p.weight,
            )
        })
        .collect()
});

/// All categories that participate in the vote
const VOTED_TYPES: &[QueryType] = &[
    QueryType::Metadata,
    QueryType::Navigation,
    QueryType::Content,
    QueryType::Comparison,
    QueryType::Summary,
];

// ============================================================================
// CLASSIFIER
// ============================================================================

/// Configuration for the classifier
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Deadline for the advisory intent hint call
    pub hint_timeout: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            hint_timeout: Duration::from_secs(2),
        }
    }
}

const INTENT_HINT_SYSTEM: &str = "Clasifica la intención de la consulta legal del usuario. \
Responde con una sola palabra: lookup, explain, compare, summarize, navigate o count.";

/// Query intent classifier.
///
/// Classification is a cheap, deterministic pattern vote so it never becomes
/// the latency bottleneck; the optional completion-service hint runs under
/// its own deadline and its failure is invisible to callers.
pub struct QueryClassifier {
    completion: Option<Arc<dyn CompletionService>>,
    config: ClassifierConfig,
}

impl QueryClassifier {
    /// Create a classifier without intent hints
    pub fn new() -> Self {
        Self {
            completion: None,
            config: ClassifierConfig::default(),
        }
    }

    /// Create a classifier that asks the completion service for intent hints
    pub fn with_intent_hints(
        completion: Arc<dyn CompletionService>,
        config: ClassifierConfig,
    ) -> Self {
        Self {
            completion: Some(completion),
            config,
        }
    }

    /// Classify a raw query.
    pub async fn classify(&self, query: &str) -> QueryClassification {
        let normalized_query = normalize_query(query);
        let (query_type, confidence) = vote(&normalized_query);
        let entities = extract_entities(&normalized_query);
        let intent = self.intent_hint(&normalized_query).await;
        let required_strategies = required_strategies(query_type, &entities);

        debug!(
            query_type = %query_type,
            confidence,
            entity_count = entities.len(),
            "query classified"
        );

        QueryClassification {
            query_type,
            confidence,
            entities,
            intent,
            required_strategies,
            normalized_query,
        }
    }

    /// Best-effort intent hint. Errors and timeouts are swallowed.
    async fn intent_hint(&self, normalized_query: &str) -> Option<IntentHint> {
        let completion = self.completion.as_ref()?;
        let call = completion.complete(INTENT_HINT_SYSTEM, normalized_query, 0.0, 8);
        match tokio::time::timeout(self.config.hint_timeout, call).await {
            Ok(Ok(label)) => Some(IntentHint::parse(&label)),
            Ok(Err(e)) => {
                debug!(error = %e, "intent hint call failed");
                None
            }
            Err(_) => {
                debug!("intent hint call timed out");
                None
            }
        }
    }
}

impl Default for QueryClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the weighted pattern vote over a normalized query.
///
/// The winner must hold a strict maximum score; a tie (or no match at all)
/// resolves to `Unknown` at zero confidence. Confidence for a winner is
/// `min(0.95, 0.6 + 0.15 * matched_pattern_count)`.
fn vote(normalized_query: &str) -> (QueryType, f32) {
    let mut scores = [0.0f32; 5];
    let mut matches = [0u32; 5];

    for (query_type, regex, weight) in COMPILED_PATTERNS.iter() {
        if regex.is_match(normalized_query) {
            let idx = vote_index(*query_type);
            scores[idx] += weight;
            matches[idx] += 1;
        }
    }

    let mut best_idx = None;
    let mut best_score = 0.0f32;
    let mut tied = false;
    for (idx, &score) in scores.iter().enumerate() {
        if score > best_score {
            best_score = score;
            best_idx = Some(idx);
            tied = false;
        } else if score == best_score && score > 0.0 {
            tied = true;
        }
    }

    match best_idx {
        Some(idx) if !tied => {
            let confidence = (0.6 + 0.15 * matches[idx] as f32).min(0.95);
            (VOTED_TYPES[idx], confidence)
        }
        _ => (QueryType::Unknown, 0.0),
    }
}

/// Position of a voted category in the score arrays
fn vote_index(query_type: QueryType) -> usize {
    match query_type {
        QueryType::Metadata => 0,
        QueryType::Navigation => 1,
        QueryType::Content => 2,
        QueryType::Comparison => 3,
        QueryType::Summary => 4,
        // Unknown never appears in the pattern table
        QueryType::Unknown => 0,
    }
}

/// Map a query type (plus extracted entities) to its strategy list
fn required_strategies(query_type: QueryType, entities: &[QueryEntity]) -> Vec<RetrievalStrategy> {
    match query_type {
        QueryType::Metadata => vec![
            RetrievalStrategy::MetadataSearch,
            RetrievalStrategy::DocumentSummary,
            RetrievalStrategy::StructureSearch,
        ],
        QueryType::Navigation => {
            let mut strategies = vec![
                RetrievalStrategy::StructureSearch,
                RetrievalStrategy::SemanticSearch,
            ];
            let has_numbered_entity = entities.iter().any(|e| {
                matches!(
                    e.entity_type,
                    EntityType::Article | EntityType::Chapter | EntityType::Section
                )
            });
            if has_numbered_entity {
                strategies.insert(0, RetrievalStrategy::DirectArticleLookup);
            }
            strategies
        }
        QueryType::Content | QueryType::Comparison => vec![
            RetrievalStrategy::SemanticSearch,
            RetrievalStrategy::KeywordSearch,
        ],
        QueryType::Summary => vec![
            RetrievalStrategy::DocumentSummary,
            RetrievalStrategy::SummarySearch,
        ],
        QueryType::Unknown => vec![
            RetrievalStrategy::SemanticSearch,
            RetrievalStrategy::MetadataSearch,
            RetrievalStrategy::SummarySearch,
        ],
    }
}

// ============================================================================
// TESTS
// ============================================================================
