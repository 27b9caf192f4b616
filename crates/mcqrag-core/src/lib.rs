//! mcqrag-core
//!
//! Domain types, the error taxonomy, configuration, and the service traits
//! shared by the indexing, retrieval, answering and evaluation crates.

pub mod chunking;
pub mod classifier;
pub mod config;
pub mod error;
pub mod loader;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
