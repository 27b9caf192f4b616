//! mcqrag-embed
//!
//! Dense embedding services behind `mcqrag_core::traits::Embedder`: a candle
//! XLM-RoBERTa encoder and a hashing fake used by tests.
use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::info;

use mcqrag_core::config::{expand_path, EmbeddingBackend, EmbeddingSettings};
use mcqrag_core::traits::Embedder;

pub mod device;
pub mod fake;
pub mod model;
pub mod pool;
pub mod tokenize;

pub use fake::FakeEmbedder;
pub use model::EmbeddingModel;
pub use pool::masked_mean_l2;

/// `APP_USE_FAKE_EMBEDDINGS=1` forces the fake embedder regardless of config.
pub fn fake_forced() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

pub fn build_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    if fake_forced() || settings.backend == EmbeddingBackend::Fake {
        info!(dim = settings.dim, "Using FakeEmbedder");
        return Ok(Arc::new(FakeEmbedder::new(settings.dim)));
    }
    let model = EmbeddingModel::load(&expand_path(&settings.model_dir), settings.max_len)?;
    if model.dim() != settings.dim {
        bail!(
            "embedding.dim is {} but the model at {} produces {}-dimensional vectors",
            settings.dim,
            settings.model_dir,
            model.dim()
        );
    }
    Ok(Arc::new(model))
}
