use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

pub const ANALYZER: &str = "text_with_stopwords";

/// Handles to every field of the chunk schema.
#[derive(Debug, Clone, Copy)]
pub struct ChunkFields {
	pub id: Field,
	pub doc_id: Field,
	pub chunk_index: Field,
	pub char_start: Field,
	pub char_end: Field,
	pub page: Field,
	pub title: Field,
	pub section: Field,
	pub text: Field,
}

impl ChunkFields {
	pub fn from_schema(schema: &Schema) -> tantivy::Result<Self> {
		Ok(Self {
			id: schema.get_field("id")?,
			doc_id: schema.get_field("doc_id")?,
			chunk_index: schema.get_field("chunk_index")?,
			char_start: schema.get_field("char_start")?,
			char_end: schema.get_field("char_end")?,
			page: schema.get_field("page")?,
			title: schema.get_field("title")?,
			section: schema.get_field("section")?,
			text: schema.get_field("text")?,
		})
	}
}

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field("id", STRING | STORED);
	schema_builder.add_text_field("doc_id", STRING | STORED);
	schema_builder.add_u64_field("chunk_index", STORED);
	schema_builder.add_u64_field("char_start", STORED);
	schema_builder.add_u64_field("char_end", STORED);
	schema_builder.add_u64_field("page", STORED);
	schema_builder.add_text_field("title", STORED);
	let analyzed = TextFieldIndexing::default()
		.set_tokenizer(ANALYZER)
		.set_index_option(IndexRecordOption::WithFreqsAndPositions);
	schema_builder.add_text_field("section", TextOptions::default().set_indexing_options(analyzed.clone()).set_stored());
	schema_builder.add_text_field("text", TextOptions::default().set_indexing_options(analyzed).set_stored());
	schema_builder.build()
}

/// Lower-casing analyzer that drops common English and Vietnamese function words.
///
/// Vietnamese is written with space-separated syllables, so the stop list is
/// per syllable.
pub fn register_tokenizer(index: &Index) {
	let stop_words = [
		// English
		"a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "in", "is", "it", "its", "of", "on",
		"that", "the", "to", "was", "will", "with", "or", "but", "this", "these", "they", "their", "there", "then",
		"than", "so", "if", "when", "which", "who", "can", "could", "should", "would", "may", "do", "does", "have",
		// Vietnamese
		"và", "là", "của", "có", "các", "những", "được", "cho", "trong", "với", "một", "này", "đó", "thì", "mà",
		"để", "khi", "từ", "theo", "như", "nào", "gì", "hay", "hoặc", "về", "đã", "sẽ", "đang", "bị", "bởi", "tại",
	];
	let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(stop_words.iter().map(|s| s.to_string())))
		.build();
	index.tokenizers().register(ANALYZER, tokenizer);
}
