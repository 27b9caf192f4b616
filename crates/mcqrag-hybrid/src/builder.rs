//! Chunk store builder: chunk, embed and write to both indexes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use mcqrag_core::chunking::{Chunker, ChunkingConfig};
use mcqrag_core::error::{Error, Result};
use mcqrag_core::traits::{Embedder, TextIndexer, VectorIndexer};
use mcqrag_core::types::{Chunk, Document, EmbeddedChunk};

/// How `build` treats existing index contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexMode {
    /// Discard both indexes, then populate them from the documents.
    Rebuild,
    /// Populate empty indexes; keep consistent non-empty ones untouched;
    /// refuse anything else.
    Reuse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexAction {
    Rebuilt,
    Populated,
    Reused,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexReport {
    pub mode: IndexMode,
    pub action: IndexAction,
    pub documents: usize,
    pub chunks: usize,
    pub text_count: usize,
    pub vector_count: usize,
    pub fingerprint: String,
    pub elapsed_ms: u64,
}

/// Written next to the indexes after every successful population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub fingerprint: String,
    pub documents: usize,
    pub chunks: usize,
    pub chunk_size: usize,
    pub overlap: usize,
    pub embedder_id: String,
    pub built_at: DateTime<Utc>,
}

impl IndexManifest {
    pub fn read(path: &Path) -> Option<Self> {
        let raw = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&raw).ok()
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| Error::IndexBuild(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// blake3 over document ids, texts and chunking parameters.
pub fn corpus_fingerprint(documents: &[Document], chunking: ChunkingConfig) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(chunking.chunk_size as u64).to_le_bytes());
    hasher.update(&(chunking.overlap as u64).to_le_bytes());
    for doc in documents {
        hasher.update(&(doc.id.len() as u64).to_le_bytes());
        hasher.update(doc.id.as_bytes());
        hasher.update(&(doc.text.len() as u64).to_le_bytes());
        hasher.update(doc.text.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

pub struct ChunkStoreBuilder {
    embedder: Arc<dyn Embedder>,
    text: Arc<dyn TextIndexer>,
    vector: Arc<dyn VectorIndexer>,
    batch_size: usize,
    passage_prefix: String,
    manifest_path: Option<PathBuf>,
}

fn build_err(context: &str) -> impl Fn(anyhow::Error) -> Error + '_ {
    move |e| Error::IndexBuild(format!("{context}: {e:#}"))
}

impl ChunkStoreBuilder {
    pub fn new(embedder: Arc<dyn Embedder>, text: Arc<dyn TextIndexer>, vector: Arc<dyn VectorIndexer>) -> Self {
        Self { embedder, text, vector, batch_size: 32, passage_prefix: String::new(), manifest_path: None }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_passage_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.passage_prefix = prefix.into();
        self
    }

    pub fn with_manifest(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = Some(path.into());
        self
    }

    pub async fn build(&self, documents: &[Document], chunk_size: usize, overlap: usize, mode: IndexMode) -> Result<IndexReport> {
        let start = Instant::now();
        let chunking = ChunkingConfig::new(chunk_size, overlap)?;
        let fingerprint = corpus_fingerprint(documents, chunking);
        let (text_count, vector_count) = self.counts().await?;
        info!(?mode, text_count, vector_count, documents = documents.len(), "Preparing indexes");

        let action = match mode {
            IndexMode::Rebuild => {
                self.text.clear().map_err(build_err("clearing lexical index"))?;
                self.vector.clear().await.map_err(build_err("clearing vector index"))?;
                IndexAction::Rebuilt
            }
            IndexMode::Reuse if text_count == 0 && vector_count == 0 => IndexAction::Populated,
            IndexMode::Reuse if text_count > 0 && text_count == vector_count => {
                self.check_manifest(&fingerprint);
                return Ok(IndexReport {
                    mode,
                    action: IndexAction::Reused,
                    documents: documents.len(),
                    chunks: text_count,
                    text_count,
                    vector_count,
                    fingerprint,
                    elapsed_ms: elapsed_ms(start),
                });
            }
            IndexMode::Reuse => {
                return Err(Error::IndexBuild(format!(
                    "indexes are inconsistent (lexical has {text_count} chunks, vector has {vector_count}); rebuild the index"
                )));
            }
        };

        let chunks = Chunker::new(chunking)?.chunk_documents(documents);
        info!(chunks = chunks.len(), "Chunked documents");
        let embedded = self.embed(&chunks).await?;
        self.vector.index(&embedded).await.map_err(build_err("writing vector index"))?;
        self.text.index(&chunks).map_err(build_err("writing lexical index"))?;

        let (text_count, vector_count) = self.counts().await?;
        if text_count != chunks.len() || vector_count != chunks.len() {
            return Err(Error::IndexBuild(format!(
                "expected {} chunks in both indexes, found lexical={text_count} vector={vector_count}",
                chunks.len()
            )));
        }

        if let Some(path) = &self.manifest_path {
            IndexManifest {
                fingerprint: fingerprint.clone(),
                documents: documents.len(),
                chunks: chunks.len(),
                chunk_size,
                overlap,
                embedder_id: self.embedder.embedder_id(),
                built_at: Utc::now(),
            }
            .write(path)?;
        }
        info!(?action, chunks = chunks.len(), "Indexes ready");
        Ok(IndexReport {
            mode,
            action,
            documents: documents.len(),
            chunks: chunks.len(),
            text_count,
            vector_count,
            fingerprint,
            elapsed_ms: elapsed_ms(start),
        })
    }

    async fn counts(&self) -> Result<(usize, usize)> {
        let text = self.text.count().map_err(build_err("counting lexical index"))?;
        let vector = self.vector.count().await.map_err(build_err("counting vector index"))?;
        Ok((text, vector))
    }

    fn check_manifest(&self, fingerprint: &str) {
        let Some(path) = &self.manifest_path else { return };
        match IndexManifest::read(path) {
            Some(m) if m.fingerprint == fingerprint => {
                info!(built_at = %m.built_at, embedder = %m.embedder_id, "Reusing indexes");
            }
            Some(m) => warn!(
                built_at = %m.built_at,
                "Corpus or chunking changed since the indexes were built; reusing them unchanged (rebuild to refresh)"
            ),
            None => warn!(path = %path.display(), "No index manifest found; reusing indexes unchanged"),
        }
    }

    async fn embed(&self, chunks: &[Chunk]) -> Result<Vec<EmbeddedChunk>> {
        let dim = self.embedder.dim();
        let pb = ProgressBar::new(chunks.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} embedded ({percent}%)")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        let mut out = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| format!("{}{}", self.passage_prefix, c.text)).collect();
            let embedder = Arc::clone(&self.embedder);
            let vectors = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
                .await
                .map_err(|e| Error::IndexBuild(format!("embedding task failed: {e}")))?
                .map_err(build_err("embedding chunks"))?;
            if vectors.len() != batch.len() {
                return Err(Error::IndexBuild(format!(
                    "embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                )));
            }
            for (chunk, embedding) in batch.iter().zip(vectors) {
                if embedding.len() != dim {
                    return Err(Error::IndexBuild(format!(
                        "chunk {} embedded to {} dimensions, expected {dim}",
                        chunk.id,
                        embedding.len()
                    )));
                }
                out.push(EmbeddedChunk { chunk: chunk.clone(), embedding });
            }
            pb.inc(batch.len() as u64);
        }
        pb.finish_and_clear();
        Ok(out)
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
