use anyhow::Result;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Value};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};
use tracing::{debug, info};

use mcqrag_core::traits::TextIndexer;
use mcqrag_core::types::{Chunk, SearchHit, SourceKind};

use crate::tantivy_utils::{build_schema, register_tokenizer, ChunkFields};

const WRITER_MEMORY: usize = 50_000_000;

pub struct TantivyIndexer {
	index: Index,
	reader: IndexReader,
	fields: ChunkFields,
}

impl TantivyIndexer {
	/// Open the index in `index_dir`, creating an empty one if none exists.
	pub fn open(index_dir: &Path) -> Result<Self> {
		std::fs::create_dir_all(index_dir)?;
		let dir = MmapDirectory::open(index_dir)?;
		let index = Index::open_or_create(dir, build_schema())?;
		Self::from_index(index)
	}

	/// In-RAM index for tests and one-off runs.
	pub fn in_memory() -> Result<Self> {
		Self::from_index(Index::create_in_ram(build_schema()))
	}

	fn from_index(index: Index) -> Result<Self> {
		register_tokenizer(&index);
		let fields = ChunkFields::from_schema(&index.schema())?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		Ok(Self { index, reader, fields })
	}

	fn to_document(&self, c: &Chunk) -> TantivyDocument {
		let f = &self.fields;
		let mut doc = TantivyDocument::default();
		doc.add_text(f.id, &c.id);
		doc.add_text(f.doc_id, &c.doc_id);
		doc.add_u64(f.chunk_index, c.chunk_index as u64);
		doc.add_u64(f.char_start, c.char_start as u64);
		doc.add_u64(f.char_end, c.char_end as u64);
		if let Some(page) = c.page {
			doc.add_u64(f.page, page as u64);
		}
		if let Some(title) = &c.title {
			doc.add_text(f.title, title);
		}
		if let Some(section) = &c.section {
			doc.add_text(f.section, section);
		}
		doc.add_text(f.text, &c.text);
		doc
	}

	fn to_chunk(&self, doc: &TantivyDocument) -> Chunk {
		let f = &self.fields;
		let text = |field: Field| doc.get_first(field).and_then(|v| v.as_str()).map(str::to_string);
		let num = |field: Field| doc.get_first(field).and_then(|v| v.as_u64()).map(|n| n as usize);
		Chunk {
			id: text(f.id).unwrap_or_default(),
			doc_id: text(f.doc_id).unwrap_or_default(),
			chunk_index: num(f.chunk_index).unwrap_or_default(),
			char_start: num(f.char_start).unwrap_or_default(),
			char_end: num(f.char_end).unwrap_or_default(),
			text: text(f.text).unwrap_or_default(),
			title: text(f.title),
			section: text(f.section),
			page: num(f.page),
		}
	}
}

impl TextIndexer for TantivyIndexer {
	fn index(&self, chunks: &[Chunk]) -> Result<()> {
		let mut writer: IndexWriter = self.index.writer(WRITER_MEMORY)?;
		for c in chunks {
			writer.add_document(self.to_document(c))?;
		}
		writer.commit()?;
		self.reader.reload()?;
		info!(chunks = chunks.len(), "Tantivy: committed chunks");
		Ok(())
	}

	fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
		if k == 0 || query.trim().is_empty() {
			return Ok(Vec::new());
		}
		let searcher = self.reader.searcher();
		let qp = QueryParser::for_index(&self.index, vec![self.fields.text, self.fields.section]);
		// question text is free prose; syntax errors must not fail the search
		let (q, errors) = qp.parse_query_lenient(query);
		if !errors.is_empty() {
			debug!(errors = errors.len(), "Tantivy: lenient parse dropped query parts");
		}
		let top_docs = searcher.search(&q, &TopDocs::with_limit(k))?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			hits.push(SearchHit { chunk: self.to_chunk(&doc), score, source: SourceKind::Text });
		}
		Ok(hits)
	}

	fn count(&self) -> Result<usize> {
		self.reader.reload()?;
		Ok(self.reader.searcher().num_docs() as usize)
	}

	fn clear(&self) -> Result<()> {
		let mut writer: IndexWriter = self.index.writer(WRITER_MEMORY)?;
		writer.delete_all_documents()?;
		writer.commit()?;
		self.reader.reload()?;
		Ok(())
	}
}
