//! Keyword Retriever
//!
//! Lexical full-text ranking over passage content (FTS5/bm25 at the
//! datastore layer).

use std::sync::Arc;

use tracing::warn;

use crate::retrieval::{RetrievalConfig, SearchResult, SourceType};
use crate::storage::{Datastore, Scope};

/// Full-text retrieval over passage content
pub struct KeywordRetriever {
    datastore: Arc<dyn Datastore>,
    config: RetrievalConfig,
}

impl KeywordRetriever {
    pub fn new(datastore: Arc<dyn Datastore>, config: RetrievalConfig) -> Self {
        Self { datastore, config }
    }

    /// Search passages lexically. No results and datastore failures both
    /// yield an empty list.
    pub async fn search(&self, query: &str, scope: &Scope) -> Vec<SearchResult> {
        let attempt = self
            .datastore
            .passage_text_search(scope, query, self.config.passage_limit);

        match tokio::time::timeout(self.config.timeout, attempt).await {
            Ok(Ok(hits)) => hits
                .into_iter()
                .map(|hit| SearchResult::from_passage(hit, SourceType::Keyword))
                .collect(),
            Ok(Err(e)) => {
                warn!(error = %e, "keyword retrieval failed");
                Vec::new()
            }
            Err(_) => {
                warn!("keyword retrieval timed out");
                Vec::new()
            }
        }
    }
}
