//! Wiring from `Settings` to the concrete services.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use mcqrag_answer::{AnswerSynthesizer, HttpGenerator};
use mcqrag_core::config::{expand_path, Settings};
use mcqrag_core::loader::load_documents;
use mcqrag_core::traits::Embedder;
use mcqrag_embed::build_embedder;
use mcqrag_eval::{Evaluator, EvaluatorOptions, QuestionPipeline};
use mcqrag_hybrid::{ChunkStoreBuilder, HybridRetriever, IndexMode, IndexReport};
use mcqrag_text::TantivyIndexer;
use mcqrag_vector::LanceVectorIndex;

pub struct Services {
    pub settings: Settings,
    pub embedder: Arc<dyn Embedder>,
    pub text: Arc<TantivyIndexer>,
    pub vector: Arc<LanceVectorIndex>,
}

impl Services {
    /// Load the embedder and open both indexes; any failure is fatal.
    pub async fn open(settings: Settings) -> anyhow::Result<Self> {
        let embedding = settings.embedding.clone();
        let embedder = tokio::task::spawn_blocking(move || build_embedder(&embedding)).await??;

        let tantivy_dir = settings.tantivy_dir();
        let text = TantivyIndexer::open(&tantivy_dir)
            .with_context(|| format!("opening lexical index at {}", tantivy_dir.display()))?;
        let lancedb_dir = settings.lancedb_dir();
        let vector = LanceVectorIndex::open(&lancedb_dir, &settings.data.vector_table, embedder.dim())
            .await
            .with_context(|| format!("opening vector index at {}", lancedb_dir.display()))?;
        info!(
            embedder = %embedder.embedder_id(),
            tantivy = %tantivy_dir.display(),
            lancedb = %lancedb_dir.display(),
            "Services ready"
        );
        Ok(Self { settings, embedder, text: Arc::new(text), vector: Arc::new(vector) })
    }

    pub fn builder(&self) -> ChunkStoreBuilder {
        ChunkStoreBuilder::new(Arc::clone(&self.embedder), self.text.clone(), self.vector.clone())
            .with_batch_size(self.settings.embedding.batch_size)
            .with_passage_prefix(self.settings.embedding.passage_prefix.clone())
            .with_manifest(self.settings.manifest_path())
    }

    /// Load the corpus and bring the indexes into the state `mode` asks for.
    pub async fn prepare(&self, mode: IndexMode) -> anyhow::Result<IndexReport> {
        let documents = load_documents(&expand_path(&self.settings.data.documents))?;
        let chunking = &self.settings.chunking;
        Ok(self.builder().build(&documents, chunking.chunk_size, chunking.overlap, mode).await?)
    }

    pub fn pipeline(&self, top_k: usize) -> anyhow::Result<QuestionPipeline> {
        let retriever = HybridRetriever::new(
            Arc::clone(&self.embedder),
            self.text.clone(),
            self.vector.clone(),
            &self.settings.retrieval,
            &self.settings.embedding,
        );
        let generator = HttpGenerator::new(&self.settings.generation)?;
        info!(url = %generator.url(), model = %self.settings.generation.model, "Generation service");
        let synthesizer = AnswerSynthesizer::new(Arc::new(generator))?;
        Ok(QuestionPipeline::new(retriever, synthesizer, top_k))
    }

    pub fn evaluator(&self) -> anyhow::Result<Evaluator> {
        let pipeline = self.pipeline(self.settings.retrieval.top_k)?;
        Ok(Evaluator::new(pipeline, EvaluatorOptions::from_settings(&self.settings))?)
    }
}

pub fn index_mode(rebuild: bool) -> IndexMode {
    if rebuild {
        IndexMode::Rebuild
    } else {
        IndexMode::Reuse
    }
}
