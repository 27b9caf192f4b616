//! mcqrag-vector
//!
//! LanceDB-backed dense index over embedded chunks.
use anyhow::Result;
use async_trait::async_trait;
use lancedb::Connection;
use std::path::Path;

use mcqrag_core::traits::VectorIndexer;
use mcqrag_core::types::{EmbeddedChunk, SearchHit};

pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub struct LanceVectorIndex {
	db: Connection,
	table_name: String,
	dim: usize,
}

impl LanceVectorIndex {
	/// Connect to the database at `db_path` and make sure the chunk table exists
	/// with a vector column of width `dim`.
	pub async fn open(db_path: &Path, table_name: &str, dim: usize) -> Result<Self> {
		std::fs::create_dir_all(db_path)?;
		let db = table::open_db(db_path.to_string_lossy().as_ref()).await?;
		table::ensure_chunk_table(&db, table_name, dim).await?;
		Ok(Self { db, table_name: table_name.to_string(), dim })
	}

	pub fn dim(&self) -> usize {
		self.dim
	}
}

#[async_trait]
impl VectorIndexer for LanceVectorIndex {
	async fn index(&self, chunks: &[EmbeddedChunk]) -> Result<()> {
		writer::insert_chunks(&self.db, &self.table_name, self.dim, chunks).await
	}

	async fn search_vec(&self, query_vec: &[f32], k: usize) -> Result<Vec<SearchHit>> {
		if k == 0 || self.count().await? == 0 {
			return Ok(Vec::new());
		}
		search::search_table(&self.db, &self.table_name, query_vec, k).await
	}

	async fn count(&self) -> Result<usize> {
		let table = self.db.open_table(&self.table_name).execute().await?;
		Ok(table.count_rows(None).await?)
	}

	async fn clear(&self) -> Result<()> {
		let table = self.db.open_table(&self.table_name).execute().await?;
		table.delete("id IS NOT NULL").await?;
		Ok(())
	}
}
