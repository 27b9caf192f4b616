//! mcqrag-hybrid
//!
//! Builds the chunk store and answers hybrid (dense + lexical) queries over it.
pub mod builder;
pub mod fusion;
pub mod retriever;

pub use builder::{corpus_fingerprint, ChunkStoreBuilder, IndexAction, IndexManifest, IndexMode, IndexReport};
pub use fusion::{fuse, FusionParams, RRF_K};
pub use retriever::HybridRetriever;
