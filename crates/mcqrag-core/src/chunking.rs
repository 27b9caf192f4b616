//! Character-window chunking with overlap and provenance.

use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        let cfg = Self { chunk_size, overlap };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::IndexBuild("chunk_size must be > 0".into()));
        }
        if self.overlap >= self.chunk_size {
            return Err(Error::IndexBuild(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 1000, overlap: 150 }
    }
}

/// Window boundaries `[start, end)` over a text of `len` characters.
pub fn spans(len: usize, cfg: ChunkingConfig) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    if len == 0 || cfg.validate().is_err() {
        return out;
    }
    let mut start = 0;
    loop {
        let end = (start + cfg.chunk_size).min(len);
        out.push((start, end));
        if end == len {
            break;
        }
        start += cfg.stride();
    }
    out
}

#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    pub fn chunk_document(&self, doc: &Document) -> Vec<Chunk> {
        // byte offset of every char, plus the end, so char windows slice cleanly
        let mut byte_at: Vec<usize> = doc.text.char_indices().map(|(b, _)| b).collect();
        byte_at.push(doc.text.len());
        let len = byte_at.len() - 1;
        let headings = headings(&doc.text);

        spans(len, self.config)
            .into_iter()
            .enumerate()
            .filter_map(|(chunk_index, (start, end))| {
                let text = &doc.text[byte_at[start]..byte_at[end]];
                if text.trim().is_empty() {
                    return None;
                }
                let section = section_at(&headings, start).map(str::to_string);
                let page = (!doc.page_markers.is_empty()).then(|| doc.page_at(start));
                Some(Chunk {
                    id: Chunk::make_id(&doc.id, chunk_index),
                    doc_id: doc.id.clone(),
                    chunk_index,
                    char_start: start,
                    char_end: end,
                    text: text.to_string(),
                    title: doc.title.clone(),
                    section,
                    page,
                })
            })
            .collect()
    }

    pub fn chunk_documents(&self, docs: &[Document]) -> Vec<Chunk> {
        docs.iter().flat_map(|d| self.chunk_document(d)).collect()
    }
}

/// Markdown headings as `(char offset of the line, heading text)`.
fn headings(text: &str) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            let title = trimmed.trim_start_matches('#').trim();
            if !title.is_empty() {
                out.push((offset, title.to_string()));
            }
        }
        offset += line.chars().count();
    }
    out
}

fn section_at(headings: &[(usize, String)], offset: usize) -> Option<&str> {
    let idx = headings.partition_point(|(at, _)| *at <= offset);
    idx.checked_sub(1).map(|i| headings[i].1.as_str())
}
