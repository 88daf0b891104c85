use async_trait::async_trait;
use std::sync::Arc;

use super::{Passage, Retriever};
use crate::embeddings::Embedder;
use crate::error::Result;
use crate::index::VectorIndex;

/// Similarity search over a `VectorIndex`: embed the query, then rank chunks
/// by cosine similarity.
pub struct VectorRetriever {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
}

impl VectorRetriever {
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<dyn Embedder>) -> Self {
        Self { index, embedder }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Passage>> {
        if self.index.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self.embedder.embed_query(query).await?;
        let hits = self.index.search(&query_vec, k)?;
        log::debug!(
            "Vector search over {} chunks returned {} hits (best score {:.3})",
            self.index.len(),
            hits.len(),
            hits.first().map_or(0.0, |h| h.score)
        );

        Ok(hits
            .into_iter()
            .map(|hit| Passage::new(hit.entry.content.clone()))
            .collect())
    }
}
