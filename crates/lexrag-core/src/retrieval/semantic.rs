//! Semantic Retriever
//!
//! Embeds the query and ranks stored passage vectors by cosine similarity.

use std::sync::Arc;

use tracing::warn;

use crate::retrieval::{RetrievalConfig, RetrievalError, SearchResult, SourceType};
use crate::services::QueryEmbedder;
use crate::storage::{Datastore, Scope};

/// Vector-similarity retrieval over passage embeddings
pub struct SemanticRetriever {
    datastore: Arc<dyn Datastore>,
    embedder: Arc<QueryEmbedder>,
    config: RetrievalConfig,
}

impl SemanticRetriever {
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

    /// Search passages semantically. A failed embedding call or datastore
    /// error degrades coverage, it never propagates.
    pub async fn search(&self, query: &str, scope: &Scope) -> Vec<SearchResult> {
        let attempt = async {
            let vector = self.embedder.embed(query).await?;
            let hits = self
                .datastore
                .passage_vector_search(scope, &vector, self.config.passage_limit)
                .await?;
            Ok::<_, RetrievalError>(
                hits.into_iter()
                    .map(|hit| SearchResult::from_passage(hit, SourceType::Semantic))
                    .collect(),
            )
        };

        match tokio::time::timeout(self.config.timeout, attempt).await {
            Ok(Ok(results)) => results,
            Ok(Err(e)) => {
                warn!(error = %e, "semantic retrieval failed");
                Vec::new()
            }
            Err(_) => {
                warn!("semantic retrieval timed out");
                Vec::new()
            }
        }
    }
}
