use anyhow::{ensure, Result};
use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::Connection;
use std::sync::Arc;
use tracing::info;

use mcqrag_core::types::EmbeddedChunk;

use crate::schema::build_chunk_schema;

const INSERT_BATCH: usize = 1000;

/// Append embedded chunks to `table_name` in fixed-size batches.
pub async fn insert_chunks(conn: &Connection, table_name: &str, dim: usize, chunks: &[EmbeddedChunk]) -> Result<()> {
	if chunks.is_empty() {
		info!(table = table_name, "LanceDB: no chunks to index");
		return Ok(());
	}
	info!(table = table_name, chunks = chunks.len(), "LanceDB: indexing chunks");
	let pb = ProgressBar::new(chunks.len() as u64);
	pb.set_style(
		ProgressStyle::default_bar()
			.template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} vectors ({percent}%) {msg}")?
			.progress_chars("#>-"),
	);
	let table = conn.open_table(table_name).execute().await?;
	for batch in chunks.chunks(INSERT_BATCH) {
		let record_batch = to_record_batch(batch, dim)?;
		let schema = record_batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
		table.add(reader).execute().await?;
		pb.inc(batch.len() as u64);
	}
	pb.finish_with_message("LanceDB indexing completed");
	Ok(())
}

pub fn to_record_batch(chunks: &[EmbeddedChunk], dim: usize) -> Result<RecordBatch> {
	for ec in chunks {
		ensure!(
			ec.embedding.len() == dim,
			"chunk {} has a {}-dimensional embedding, expected {dim}",
			ec.chunk.id,
			ec.embedding.len()
		);
	}
	let as_i64 = |n: usize| i64::try_from(n).unwrap_or(i64::MAX);
	let ids: Vec<&str> = chunks.iter().map(|c| c.chunk.id.as_str()).collect();
	let doc_ids: Vec<&str> = chunks.iter().map(|c| c.chunk.doc_id.as_str()).collect();
	let chunk_indices: Vec<i64> = chunks.iter().map(|c| as_i64(c.chunk.chunk_index)).collect();
	let starts: Vec<i64> = chunks.iter().map(|c| as_i64(c.chunk.char_start)).collect();
	let ends: Vec<i64> = chunks.iter().map(|c| as_i64(c.chunk.char_end)).collect();
	let pages: Vec<Option<i64>> = chunks.iter().map(|c| c.chunk.page.map(as_i64)).collect();
	let titles: Vec<Option<&str>> = chunks.iter().map(|c| c.chunk.title.as_deref()).collect();
	let sections: Vec<Option<&str>> = chunks.iter().map(|c| c.chunk.section.as_deref()).collect();
	let texts: Vec<&str> = chunks.iter().map(|c| c.chunk.text.as_str()).collect();
	let vectors = chunks.iter().map(|c| Some(c.embedding.iter().copied().map(Some).collect::<Vec<_>>()));

	let record_batch = RecordBatch::try_new(
		build_chunk_schema(dim),
		vec![
			Arc::new(StringArray::from(ids)),
			Arc::new(StringArray::from(doc_ids)),
			Arc::new(Int64Array::from(chunk_indices)),
			Arc::new(Int64Array::from(starts)),
			Arc::new(Int64Array::from(ends)),
			Arc::new(Int64Array::from(pages)),
			Arc::new(StringArray::from(titles)),
			Arc::new(StringArray::from(sections)),
			Arc::new(StringArray::from(texts)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim as i32)),
		],
	)?;
	Ok(record_batch)
}
