//! mcqrag-text
//!
//! Tantivy-backed lexical (BM25) index over chunks. See `index` for the
//! `TextIndexer` implementation and `tantivy_utils` for schema and analyzer.
pub mod tantivy_utils;
pub mod index;

pub use index::TantivyIndexer;
