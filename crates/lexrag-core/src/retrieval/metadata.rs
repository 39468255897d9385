//! Metadata Retriever
//!
//! Substring match against document titles and stored summaries. Every hit
//! carries the same fixed score - this retriever finds documents, it does
//! not rank them finely.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::query::{extract_entities, normalize_query, EntityType};
use crate::retrieval::{clamp_score, RetrievalConfig, SearchResult, SourceType};
use crate::storage::{Datastore, DocumentRecord, Scope};

/// Document-level lookup by title or summary text
pub struct MetadataRetriever {
    datastore: Arc<dyn Datastore>,
    config: RetrievalConfig,
}

impl MetadataRetriever {
    pub fn new(datastore: Arc<dyn Datastore>, config: RetrievalConfig) -> Self {
        Self { datastore, config }
    }

    /// Search documents by name. Law-name entities take priority as needles;
    /// without one the whole normalized query is used.
    pub async fn search(&self, query: &str, scope: &Scope) -> Vec<SearchResult> {
        let normalized = normalize_query(query);
        let mut needles: Vec<String> = extract_entities(&normalized)
            .into_iter()
            .filter(|e| e.entity_type == EntityType::Law)
            .map(|e| e.normalized_value)
            .collect();
        if needles.is_empty() {
            needles.push(normalized);
        }

        let attempt = async {
            let mut results: Vec<SearchResult> = Vec::new();
            for needle in &needles {
                let documents = self
                    .datastore
                    .documents_matching(scope, needle, self.config.metadata_limit)
                    .await?;
                for document in documents {
                    if results.iter().any(|r| r.id == document.id) {
                        continue;
                    }
                    results.push(self.to_result(document));
                }
            }
            results.truncate(self.config.metadata_limit);
            Ok::<_, crate::storage::StorageError>(results)
        };

        match tokio::time::timeout(self.config.timeout, attempt).await {
            Ok(Ok(results)) => results,
            Ok(Err(e)) => {
                warn!(error = %e, "metadata retrieval failed");
                Vec::new()
            }
            Err(_) => {
                warn!("metadata retrieval timed out");
                Vec::new()
            }
        }
    }

    fn to_result(&self, document: DocumentRecord) -> SearchResult {
        let content = document
            .summary
            .clone()
            .unwrap_or_else(|| document.title.clone());

        let mut metadata = HashMap::new();
        metadata.insert(
            "documentId".to_string(),
            serde_json::Value::String(document.id.clone()),
        );
        metadata.insert(
            "documentTitle".to_string(),
            serde_json::Value::String(document.title),
        );
        if let Some(total) = document.total_articles {
            metadata.insert("totalArticles".to_string(), serde_json::Value::from(total));
        }

        SearchResult {
            id: document.id,
            content,
            score: clamp_score(self.config.metadata_score),
            source_type: SourceType::Metadata,
            metadata,
        }
    }
}
