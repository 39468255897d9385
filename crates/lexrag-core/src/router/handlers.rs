//! Strategy Handlers
//!
//! One handler per classified intent. Handlers are stateless: the dispatch
//! target is the only "state machine" and it restarts on every call.
//! Terminal failure in any handler is a fixed low-confidence answer, never
//! an error.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::query::{EntityType, QueryClassification, QueryEntity};
use crate::retrieval::{reciprocal_rank_fusion, SearchResult, SourceType, WeightedResults};
use crate::router::{QueryRouter, RouteResponse};
use crate::storage::{DocumentRecord, Scope, SectionKind, SectionRecord, SummaryRecord};
use crate::synthesis::{PromptVariant, Synthesizer};

// ============================================================================
// FIXED ANSWERS
// ============================================================================

const NO_CONTENT_ANSWER: &str =
    "No encontré información relevante para su consulta en los documentos disponibles.";

const NO_HYBRID_ANSWER: &str = "No pude encontrar información relevante para su consulta. \
     Intente reformularla o verifique que los documentos estén cargados.";

const NO_TARGET_DOCUMENT_ANSWER: &str = "No pude identificar a qué documento se refiere su \
     consulta. Indique el nombre de la ley o del documento.";

// ============================================================================
// HANDLERS
// ============================================================================

impl QueryRouter {
    /// Metadata: answer structural questions from precomputed counts and the
    /// table of contents. An unanalyzed document gets a pending-analysis
    /// placeholder at half confidence.
    pub(crate) async fn handle_metadata(
        &self,
        _query: &str,
        classification: &QueryClassification,
        scope: &Scope,
    ) -> RouteResponse {
        let Some(document) = self.resolve_target_document(classification, scope).await else {
            return base_response(NO_TARGET_DOCUMENT_ANSWER.to_string(), Vec::new(), 0.3);
        };

        if document.analyzed && document.total_articles.is_some() {
            let answer = structure_answer(&document);
            let source = document_result(&document, self.config.retrieval.metadata_score);
            base_response(answer, vec![source], 0.9)
        } else {
            let answer = format!(
                "El documento \"{}\" aún no ha sido analizado estructuralmente. \
                 El análisis se ha puesto en cola; intente nuevamente en unos momentos.",
                document.title
            );
            let source = document_result(&document, self.config.retrieval.metadata_score);
            base_response(answer, vec![source], 0.5)
        }
    }

    /// Navigation: direct structural lookup by unit number. A miss falls
    /// through to content handling.
    pub(crate) async fn handle_navigation(
        &self,
        query: &str,
        classification: &QueryClassification,
        scope: &Scope,
    ) -> RouteResponse {
        let target = classification.entities.iter().find_map(|entity| {
            section_kind(entity.entity_type).map(|kind| (kind, entity))
        });

        if let Some((kind, entity)) = target {
            match self
                .datastore
                .find_section(scope, kind, &entity.normalized_value)
                .await
            {
                Ok(Some(section)) => {
                    // The unit's stored text is returned verbatim
                    let source = section_result(&section);
                    return base_response(section.content, vec![source], 1.0);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "section lookup failed"),
            }
        }

        self.handle_content(query, classification, scope).await
    }

    /// Content: hybrid semantic+keyword retrieval fused with RRF, then
    /// synthesis over the top fused passages.
    pub(crate) async fn handle_content(
        &self,
        query: &str,
        classification: &QueryClassification,
        scope: &Scope,
    ) -> RouteResponse {
        let (semantic, keyword) = tokio::join!(
            self.semantic.search(query, scope),
            self.keyword.search(query, scope)
        );

        let fusion = &self.config.fusion;
        let fused = reciprocal_rank_fusion(
            vec![
                WeightedResults {
                    results: semantic,
                    weight: fusion.semantic_weight,
                },
                WeightedResults {
                    results: keyword,
                    weight: fusion.keyword_weight,
                },
            ],
            fusion.rrf_k,
        );

        if fused.is_empty() {
            return base_response(NO_CONTENT_ANSWER.to_string(), Vec::new(), 0.2);
        }

        let context = Synthesizer::build_context(&fused, self.config.context_passages);
        let answer = self
            .synthesizer
            .synthesize(query, &context, PromptVariant::Content)
            .await;

        // RRF scores live near 1/k; rescale the top score into [0, 1]
        let rank_signal = (fused[0].score * fusion.rrf_k).clamp(0.0, 1.0);
        let confidence = graded_confidence(classification.confidence, rank_signal);

        base_response(answer, fused, confidence)
    }

    /// Comparison: resolve each named provision independently and ask for a
    /// structured comparison. Fewer than two resolvable entities falls
    /// through to content handling.
    pub(crate) async fn handle_comparison(
        &self,
        query: &str,
        classification: &QueryClassification,
        scope: &Scope,
    ) -> RouteResponse {
        let comparable: Vec<&QueryEntity> = classification
            .entities
            .iter()
            .filter(|e| {
                matches!(
                    e.entity_type,
                    EntityType::Article
                        | EntityType::Chapter
                        | EntityType::Section
                        | EntityType::Law
                )
            })
            .collect();

        if comparable.len() < 2 {
            return self.handle_content(query, classification, scope).await;
        }

        let mut segments: Vec<String> = Vec::new();
        let mut sources: Vec<SearchResult> = Vec::new();
        let considered = comparable.len().min(3);

        for entity in comparable.into_iter().take(3) {
            if let Some((label, content, source)) = self.entity_content(entity, scope).await {
                segments.push(format!("### {label}\n{content}"));
                if let Some(source) = source {
                    sources.push(source);
                }
            }
        }

        if segments.len() < 2 {
            return self.handle_content(query, classification, scope).await;
        }

        let context = segments.join("\n\n");
        let answer = self
            .synthesizer
            .synthesize(query, &context, PromptVariant::Comparison)
            .await;

        let resolved_ratio = segments.len() as f32 / considered as f32;
        let confidence =
            (0.55 + 0.25 * resolved_ratio + 0.1 * classification.confidence).min(0.9);

        base_response(answer, sources, confidence)
    }

    /// Summary: prefer a stored executive summary; otherwise generate one
    /// on the fly from the document's first passages at lower confidence.
    pub(crate) async fn handle_summary(
        &self,
        query: &str,
        classification: &QueryClassification,
        scope: &Scope,
    ) -> RouteResponse {
        let Some(document) = self.resolve_target_document(classification, scope).await else {
            return base_response(NO_TARGET_DOCUMENT_ANSWER.to_string(), Vec::new(), 0.3);
        };

        match self.datastore.stored_summary(&document.id).await {
            Ok(Some(summary)) => {
                let source = summary_result(&document, &summary);
                base_response(summary.content, vec![source], 0.9)
            }
            other => {
                if let Err(e) = other {
                    warn!(error = %e, "stored summary lookup failed");
                }
                self.generate_summary(query, &document).await
            }
        }
    }

    /// Hybrid / unknown: run semantic, metadata and summary retrieval
    /// concurrently, merge by raw score (a looser combination than RRF) and
    /// synthesize from the merged pool.
    pub(crate) async fn handle_hybrid(
        &self,
        query: &str,
        classification: &QueryClassification,
        scope: &Scope,
    ) -> RouteResponse {
        let (semantic, metadata, summary) = tokio::join!(
            self.semantic.search(query, scope),
            self.metadata.search(query, scope),
            self.summary.search(query, scope)
        );

        let mut merged: Vec<SearchResult> = semantic
            .into_iter()
            .chain(metadata)
            .chain(summary)
            .collect();

        if merged.is_empty() {
            return base_response(NO_HYBRID_ANSWER.to_string(), Vec::new(), 0.25);
        }

        merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        let mut seen: HashSet<String> = HashSet::new();
        merged.retain(|result| seen.insert(result.id.clone()));

        let context = Synthesizer::build_context(&merged, self.config.context_passages);
        let answer = self
            .synthesizer
            .synthesize(query, &context, PromptVariant::Hybrid)
            .await;

        let confidence =
            graded_confidence(classification.confidence, merged[0].score.clamp(0.0, 1.0));

        base_response(answer, merged, confidence)
    }

    // ========================================================================
    // SHARED RESOLUTION
    // ========================================================================

    /// Pick the document a query is about: law-name entities first, falling
    /// back to the most relevant document in scope.
    async fn resolve_target_document(
        &self,
        classification: &QueryClassification,
        scope: &Scope,
    ) -> Option<DocumentRecord> {
        for entity in classification
            .entities
            .iter()
            .filter(|e| e.entity_type == EntityType::Law)
        {
            match self
                .datastore
                .documents_matching(scope, &entity.normalized_value, 1)
                .await
            {
                Ok(mut documents) if !documents.is_empty() => return Some(documents.remove(0)),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "document lookup failed"),
            }
        }

        match self.datastore.most_relevant_document(scope).await {
            Ok(document) => document,
            Err(e) => {
                warn!(error = %e, "default document lookup failed");
                None
            }
        }
    }

    /// Fetch the text a comparison entity refers to.
    async fn entity_content(
        &self,
        entity: &QueryEntity,
        scope: &Scope,
    ) -> Option<(String, String, Option<SearchResult>)> {
        if let Some(kind) = section_kind(entity.entity_type) {
            match self
                .datastore
                .find_section(scope, kind, &entity.normalized_value)
                .await
            {
                Ok(Some(section)) => {
                    let label = format!("{} {}", kind_label(kind), section.number);
                    let source = section_result(&section);
                    return Some((label, section.content, Some(source)));
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "section lookup failed"),
            }
        }

        if entity.entity_type == EntityType::Law {
            match self
                .datastore
                .documents_matching(scope, &entity.normalized_value, 1)
                .await
            {
                Ok(documents) if !documents.is_empty() => {
                    let document = &documents[0];
                    if let Some(content) = self.document_overview(document).await {
                        let source = document_result(
                            document,
                            self.config.retrieval.metadata_score,
                        );
                        return Some((document.title.clone(), content, Some(source)));
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "document lookup failed"),
            }
        }

        // Last resort: best semantic hit for the entity's own text
        let hits = self.semantic.search(&entity.value, scope).await;
        hits.into_iter().next().map(|hit| {
            let label = entity.value.clone();
            let content = hit.content.clone();
            (label, content, Some(hit))
        })
    }

    /// Best available overview text for a document
    async fn document_overview(&self, document: &DocumentRecord) -> Option<String> {
        match self.datastore.stored_summary(&document.id).await {
            Ok(Some(summary)) => return Some(summary.content),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "stored summary lookup failed"),
        }

        if let Some(summary) = &document.summary {
            return Some(summary.clone());
        }

        match self.datastore.first_passages(&document.id, 3).await {
            Ok(passages) if !passages.is_empty() => Some(
                passages
                    .into_iter()
                    .map(|p| p.content)
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "passage lookup failed");
                None
            }
        }
    }

    /// Generate a summary from the document's leading passages
    async fn generate_summary(&self, query: &str, document: &DocumentRecord) -> RouteResponse {
        let passages = match self
            .datastore
            .first_passages(&document.id, self.config.summary_passages)
            .await
        {
            Ok(passages) => passages,
            Err(e) => {
                warn!(error = %e, "passage lookup failed");
                Vec::new()
            }
        };

        if passages.is_empty() {
            let answer = format!(
                "El documento \"{}\" todavía no tiene contenido procesado para resumir.",
                document.title
            );
            return base_response(answer, Vec::new(), 0.3);
        }

        let context = passages
            .iter()
            .map(|p| p.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let answer = self
            .synthesizer
            .synthesize(query, &context, PromptVariant::Summary)
            .await;

        let source = document_result(document, self.config.retrieval.metadata_score);
        base_response(answer, vec![source], 0.8)
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Confidence monotonically related to the top retrieval signal and the
/// classification confidence.
fn graded_confidence(classification_confidence: f32, rank_signal: f32) -> f32 {
    (0.5 + 0.3 * rank_signal.clamp(0.0, 1.0) + 0.2 * classification_confidence.clamp(0.0, 1.0))
        .min(0.95)
}

fn base_response(answer: String, sources: Vec<SearchResult>, confidence: f32) -> RouteResponse {
    RouteResponse {
        answer,
        sources,
        confidence,
        from_cache: false,
        query_type: crate::query::QueryType::Unknown,
        strategies: Vec::new(),
    }
}

fn section_kind(entity_type: EntityType) -> Option<SectionKind> {
    match entity_type {
        EntityType::Article => Some(SectionKind::Article),
        EntityType::Chapter => Some(SectionKind::Chapter),
        EntityType::Section => Some(SectionKind::Section),
        _ => None,
    }
}

fn kind_label(kind: SectionKind) -> &'static str {
    match kind {
        SectionKind::Article => "Artículo",
        SectionKind::Chapter => "Capítulo",
        SectionKind::Section => "Sección",
    }
}

/// Human answer for an analyzed document's structure
fn structure_answer(document: &DocumentRecord) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(articles) = document.total_articles {
        parts.push(format!("{articles} artículos"));
    }
    if let Some(chapters) = document.total_chapters {
        parts.push(format!("{chapters} capítulos"));
    }
    if let Some(sections) = document.total_sections {
        parts.push(format!("{sections} secciones"));
    }

    let mut answer = format!("\"{}\" contiene {}.", document.title, join_spanish(&parts));
    if let Some(toc) = &document.table_of_contents {
        answer.push_str("\n\nTabla de contenidos:\n");
        answer.push_str(toc);
    }
    answer
}

fn join_spanish(parts: &[String]) -> String {
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        _ => format!(
            "{} y {}",
            parts[..parts.len() - 1].join(", "),
            parts[parts.len() - 1]
        ),
    }
}

fn document_result(document: &DocumentRecord, score: f32) -> SearchResult {
    let mut metadata = HashMap::new();
    metadata.insert(
        "documentId".to_string(),
        serde_json::Value::String(document.id.clone()),
    );
    metadata.insert(
        "documentTitle".to_string(),
        serde_json::Value::String(document.title.clone()),
    );
    if let Some(total) = document.total_articles {
        metadata.insert("totalArticles".to_string(), serde_json::Value::from(total));
    }

    SearchResult {
        id: document.id.clone(),
        content: document
            .summary
            .clone()
            .unwrap_or_else(|| document.title.clone()),
        score,
        source_type: SourceType::Metadata,
        metadata,
    }
}

fn section_result(section: &SectionRecord) -> SearchResult {
    let mut metadata = HashMap::new();
    metadata.insert(
        "documentId".to_string(),
        serde_json::Value::String(section.document_id.clone()),
    );
    metadata.insert(
        "kind".to_string(),
        serde_json::Value::String(section.kind.as_str().to_string()),
    );
    metadata.insert(
        "number".to_string(),
        serde_json::Value::String(section.number.clone()),
    );
    if let Some(title) = &section.title {
        metadata.insert("title".to_string(), serde_json::Value::String(title.clone()));
    }

    SearchResult {
        id: section.id.clone(),
        content: section.content.clone(),
        score: 1.0,
        source_type: SourceType::Metadata,
        metadata,
    }
}

fn summary_result(document: &DocumentRecord, summary: &SummaryRecord) -> SearchResult {
    let mut metadata = HashMap::new();
    metadata.insert(
        "documentId".to_string(),
        serde_json::Value::String(document.id.clone()),
    );
    metadata.insert(
        "documentTitle".to_string(),
        serde_json::Value::String(document.title.clone()),
    );

    SearchResult {
        id: summary.id.clone(),
        content: summary.content.clone(),
        score: 0.9,
        source_type: SourceType::Summary,
        metadata,
    }
}

// ============================================================================
// TESTS
// ============================================================================
