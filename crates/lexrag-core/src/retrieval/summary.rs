//! Summary Retriever
//!
//! Semantic similarity restricted to the pre-computed summary corpus rather
//! than raw passages.

use std::sync::Arc;

use tracing::warn;

use crate::retrieval::{RetrievalConfig, RetrievalError, SearchResult, SourceType};
use crate::services::QueryEmbedder;
use crate::storage::{Datastore, Scope};

/// Vector-similarity retrieval over stored document summaries
pub struct SummaryRetriever {
    datastore: Arc<dyn Datastore>,
    embedder: Arc<QueryEmbedder>,
    config: RetrievalConfig,
}

impl SummaryRetriever {
    pub fn new(
        datastore: Arc<dyn Datastore>,
        embedder: Arc<QueryEmbedder>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            datastore,
            embedder,
            config,
        }
    }

    /// Search summaries semantically, degrading to empty on any failure.
    pub async fn search(&self, query: &str, scope: &Scope) -> Vec<SearchResult> {
        let attempt = async {
            let vector = self.embedder.embed(query).await?;
            let hits = self
                .datastore
                .summary_vector_search(scope, &vector, self.config.summary_limit)
                .await?;
            Ok::<_, RetrievalError>(
                hits.into_iter()
                    .map(|hit| SearchResult::from_passage(hit, SourceType::Summary))
                    .collect(),
            )
        };

        match tokio::time::timeout(self.config.timeout, attempt).await {
            Ok(Ok(results)) => results,
            Ok(Err(e)) => {
                warn!(error = %e, "summary retrieval failed");
                Vec::new()
            }
            Err(_) => {
                warn!("summary retrieval timed out");
                Vec::new()
            }
        }
    }
}
