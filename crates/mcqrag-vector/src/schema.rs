use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const VECTOR_COLUMN: &str = "vector";

/// Chunk table layout; `dim` fixes the width of the vector column.
pub fn build_chunk_schema(dim: usize) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("doc_id", DataType::Utf8, false),
		Field::new("chunk_index", DataType::Int64, false),
		Field::new("char_start", DataType::Int64, false),
		Field::new("char_end", DataType::Int64, false),
		Field::new("page", DataType::Int64, true),
		Field::new("title", DataType::Utf8, true),
		Field::new("section", DataType::Utf8, true),
		Field::new("text", DataType::Utf8, false),
		Field::new(
			VECTOR_COLUMN,
			DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim as i32),
			true,
		),
	]))
}

/// Width of the vector column, if the schema has one.
pub fn vector_dim(schema: &Schema) -> Option<usize> {
	match schema.field_with_name(VECTOR_COLUMN).ok()?.data_type() {
		DataType::FixedSizeList(_, n) => usize::try_from(*n).ok(),
		_ => None,
	}
}
