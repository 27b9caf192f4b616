use async_trait::async_trait;

use crate::types::{Chunk, EmbeddedChunk, SearchHit};

pub trait Embedder: Send + Sync {
    /// Stable identifier recorded in the index manifest.
    fn embedder_id(&self) -> String;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

pub trait TextIndexer: Send + Sync {
    fn index(&self, chunks: &[Chunk]) -> anyhow::Result<()>;
    fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<SearchHit>>;
    fn count(&self) -> anyhow::Result<usize>;
    fn clear(&self) -> anyhow::Result<()>;
}

#[async_trait]
pub trait VectorIndexer: Send + Sync {
    async fn index(&self, chunks: &[EmbeddedChunk]) -> anyhow::Result<()>;
    async fn search_vec(&self, query_vec: &[f32], k: usize) -> anyhow::Result<Vec<SearchHit>>;
    async fn count(&self) -> anyhow::Result<usize>;
    async fn clear(&self) -> anyhow::Result<()>;
}

/// A text-generation service that answers a single prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    fn generator_id(&self) -> String;
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}
