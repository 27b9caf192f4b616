use anyhow::{anyhow, Result};
use arrow_array::{Array, Float32Array, Int64Array, RecordBatch, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType};

use mcqrag_core::types::{Chunk, SearchHit, SourceKind};

/// Cosine nearest neighbours; `score = 1 - cosine distance`.
pub async fn search_table(conn: &Connection, table_name: &str, query_vec: &[f32], k: usize) -> Result<Vec<SearchHit>> {
	let table = conn.open_table(table_name).execute().await?;
	let mut stream = table
		.vector_search(query_vec.to_vec())?
		.distance_type(DistanceType::Cosine)
		.limit(k)
		.execute()
		.await?;
	let mut hits = Vec::new();
	while let Some(batch) = stream.try_next().await? {
		hits.extend(batch_to_hits(&batch)?);
	}
	Ok(hits)
}

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<StringArray>())
		.ok_or_else(|| anyhow!("column '{name}' missing or not utf8"))
}

fn int_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int64Array> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<Int64Array>())
		.ok_or_else(|| anyhow!("column '{name}' missing or not int64"))
}

fn batch_to_hits(batch: &RecordBatch) -> Result<Vec<SearchHit>> {
	let ids = string_col(batch, "id")?;
	let doc_ids = string_col(batch, "doc_id")?;
	let chunk_indices = int_col(batch, "chunk_index")?;
	let starts = int_col(batch, "char_start")?;
	let ends = int_col(batch, "char_end")?;
	let pages = int_col(batch, "page")?;
	let titles = string_col(batch, "title")?;
	let sections = string_col(batch, "section")?;
	let texts = string_col(batch, "text")?;
	let distances = batch
		.column_by_name("_distance")
		.and_then(|c| c.as_any().downcast_ref::<Float32Array>())
		.ok_or_else(|| anyhow!("vector search result has no _distance column"))?;

	let as_usize = |v: i64| usize::try_from(v).unwrap_or_default();
	let opt_str = |arr: &StringArray, i: usize| (!arr.is_null(i)).then(|| arr.value(i).to_string());
	let mut hits = Vec::with_capacity(batch.num_rows());
	for i in 0..batch.num_rows() {
		let chunk = Chunk {
			id: ids.value(i).to_string(),
			doc_id: doc_ids.value(i).to_string(),
			chunk_index: as_usize(chunk_indices.value(i)),
			char_start: as_usize(starts.value(i)),
			char_end: as_usize(ends.value(i)),
			text: texts.value(i).to_string(),
			title: opt_str(titles, i),
			section: opt_str(sections, i),
			page: (!pages.is_null(i)).then(|| as_usize(pages.value(i))),
		};
		hits.push(SearchHit { chunk, score: 1.0 - distances.value(i), source: SourceKind::Vector });
	}
	Ok(hits)
}
