use std::sync::Arc;

use tracing::debug;

use mcqrag_core::config::{EmbeddingSettings, RetrievalSettings};
use mcqrag_core::error::{Error, Result};
use mcqrag_core::traits::{Embedder, TextIndexer, VectorIndexer};
use mcqrag_core::types::{RetrievalResult, SearchHit};

use crate::fusion::{fuse, FusionParams};

/// Dense + lexical retrieval over shared, read-only index handles.
#[derive(Clone)]
pub struct HybridRetriever {
    embedder: Arc<dyn Embedder>,
    text: Arc<dyn TextIndexer>,
    vector: Arc<dyn VectorIndexer>,
    params: FusionParams,
    top_k_dense: usize,
    top_k_lexical: usize,
    query_prefix: String,
}

impl HybridRetriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        text: Arc<dyn TextIndexer>,
        vector: Arc<dyn VectorIndexer>,
        retrieval: &RetrievalSettings,
        embedding: &EmbeddingSettings,
    ) -> Self {
        Self {
            embedder,
            text,
            vector,
            params: FusionParams::from(retrieval),
            top_k_dense: retrieval.top_k_dense,
            top_k_lexical: retrieval.top_k_lexical,
            query_prefix: embedding.query_prefix.clone(),
        }
    }

    pub async fn retrieve(&self, question: &str, top_k: usize) -> Result<RetrievalResult> {
        let (dense, lexical) = tokio::join!(self.dense(question), self.lexical(question));
        let (dense, lexical) = (dense?, lexical?);
        debug!(dense = dense.len(), lexical = lexical.len(), "Retrieved candidates");
        Ok(fuse(&dense, &lexical, &self.params, top_k))
    }

    async fn dense(&self, question: &str) -> Result<Vec<SearchHit>> {
        if self.top_k_dense == 0 {
            return Ok(Vec::new());
        }
        let embedder = Arc::clone(&self.embedder);
        let query = vec![format!("{}{}", self.query_prefix, question)];
        let mut vectors = tokio::task::spawn_blocking(move || embedder.embed_batch(&query))
            .await
            .map_err(|e| Error::Retrieval(format!("embedding task failed: {e}")))?
            .map_err(|e| Error::Retrieval(format!("query embedding failed: {e:#}")))?;
        if vectors.is_empty() {
            return Err(Error::Retrieval("embedder returned no query vector".into()));
        }
        let q_vec = vectors.swap_remove(0);
        self.vector
            .search_vec(&q_vec, self.top_k_dense)
            .await
            .map_err(|e| Error::Retrieval(format!("vector search failed: {e:#}")))
    }

    async fn lexical(&self, question: &str) -> Result<Vec<SearchHit>> {
        if self.top_k_lexical == 0 {
            return Ok(Vec::new());
        }
        let text = Arc::clone(&self.text);
        let query = question.to_string();
        let k = self.top_k_lexical;
        tokio::task::spawn_blocking(move || text.search(&query, k))
            .await
            .map_err(|e| Error::Retrieval(format!("lexical search task failed: {e}")))?
            .map_err(|e| Error::Retrieval(format!("lexical search failed: {e:#}")))
    }
}
