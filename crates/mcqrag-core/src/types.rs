//! Domain types used by the index, retrieval, answer and evaluation crates.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

pub type ChunkId = String;

/// A single option label (`A`, `B`, ...). Always stored upper-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OptionLetter(char);

impl OptionLetter {
    pub fn new(c: char) -> Option<Self> {
        let upper = c.to_ascii_uppercase();
        upper.is_ascii_uppercase().then_some(Self(upper))
    }

    pub fn as_char(self) -> char {
        self.0
    }
}

impl fmt::Display for OptionLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OptionLetter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::new(c).ok_or_else(|| format!("'{trimmed}' is not an option letter")),
            _ => Err(format!("'{trimmed}' is not an option letter")),
        }
    }
}

impl TryFrom<String> for OptionLetter {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OptionLetter> for String {
    fn from(value: OptionLetter) -> Self {
        value.0.to_string()
    }
}

/// Render a letter set as `A,C`.
pub fn format_letters(letters: &BTreeSet<OptionLetter>) -> String {
    letters.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
}

/// A source document of the corpus.
///
/// `page_markers` holds the character offsets at which a new page starts
/// (one per form-feed in the source text).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: Option<String>,
    pub text: String,
    pub page_markers: Vec<usize>,
    pub source_path: Option<String>,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let page_markers = text
            .chars()
            .enumerate()
            .filter(|(_, c)| *c == '\u{c}')
            .map(|(i, _)| i + 1)
            .collect();
        Self { id: id.into(), title: None, text, page_markers, source_path: None }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_source_path(mut self, path: impl Into<String>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// 1-based page containing the character at `offset`.
    pub fn page_at(&self, offset: usize) -> usize {
        1 + self.page_markers.partition_point(|&m| m <= offset)
    }
}

/// A bounded slice of one document, the unit of retrieval.
///
/// `char_start..char_end` are character (not byte) offsets into the owning
/// document. `id` is `"{doc_id}:{chunk_index:05}"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub doc_id: String,
    pub chunk_index: usize,
    pub char_start: usize,
    pub char_end: usize,
    pub text: String,
    pub title: Option<String>,
    pub section: Option<String>,
    pub page: Option<usize>,
}

impl Chunk {
    pub fn make_id(doc_id: &str, chunk_index: usize) -> ChunkId {
        format!("{doc_id}:{chunk_index:05}")
    }

    /// One-line provenance tag used in prompts and debug output.
    pub fn provenance(&self) -> String {
        let mut tag = format!("doc={}", self.doc_id);
        if let Some(section) = &self.section {
            tag.push_str(&format!(", section={section}"));
        }
        if let Some(page) = self.page {
            tag.push_str(&format!(", page={page}"));
        }
        tag.push_str(&format!(", chunk={}", self.id));
        tag
    }
}

/// A chunk together with its dense embedding, as written to the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// Indicates which engine produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    Vector,
    Text,
}

/// The minimal surface returned by both engines.
///
/// `score` is engine-specific but higher is always better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
    pub source: SourceKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Fused ranking for one query: descending score, ties by chunk id ascending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub hits: Vec<RankedChunk>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn chunk_ids(&self) -> Vec<ChunkId> {
        self.hits.iter().map(|h| h.chunk.id.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    /// 0-based row position in the question file.
    pub index: usize,
    pub text: String,
    pub options: BTreeMap<OptionLetter, String>,
}

impl Question {
    pub fn option_letters(&self) -> BTreeSet<OptionLetter> {
        self.options.keys().copied().collect()
    }
}

/// Graded answer key for one question.
///
/// `invalid` keeps answer tokens that were not option letters so the scorer
/// can reject the row instead of silently dropping them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundTruth {
    pub num_correct: usize,
    pub letters: BTreeSet<OptionLetter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invalid: Vec<String>,
}

impl GroundTruth {
    pub fn new(letters: impl IntoIterator<Item = OptionLetter>) -> Self {
        let letters: BTreeSet<_> = letters.into_iter().collect();
        Self { num_correct: letters.len(), letters, invalid: Vec::new() }
    }

    pub fn is_well_formed(&self) -> bool {
        self.invalid.is_empty() && self.num_correct == self.letters.len()
    }
}

/// Parsed outcome of the answer synthesizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "letters", rename_all = "snake_case")]
pub enum Answer {
    Letters(BTreeSet<OptionLetter>),
    Unparseable,
}

impl Answer {
    pub fn letters(&self) -> Option<&BTreeSet<OptionLetter>> {
        match self {
            Answer::Letters(l) => Some(l),
            Answer::Unparseable => None,
        }
    }

    pub fn is_unparseable(&self) -> bool {
        matches!(self, Answer::Unparseable)
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Letters(l) => write!(f, "{}", format_letters(l)),
            Answer::Unparseable => write!(f, "<unparseable>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub question_id: String,
    pub answer: Answer,
    /// Every raw generation output, in call order.
    pub raw_outputs: Vec<String>,
    pub chunk_ids: Vec<ChunkId>,
    pub attempts: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Retrieval,
    Generation,
    GenerationParse,
    Scoring,
    Timeout,
    Panic,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&crate::error::Error> for RecordError {
    fn from(err: &crate::error::Error) -> Self {
        Self { kind: err.kind(), message: err.to_string() }
    }
}

/// Partial-credit outcome of one scored question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Correct,
    Partial,
    Wrong,
}

impl Grade {
    /// Unweighted credit: 1.0, 0.5 or 0.0.
    pub fn credit(self) -> f64 {
        match self {
            Grade::Correct => 1.0,
            Grade::Partial => 0.5,
            Grade::Wrong => 0.0,
        }
    }
}

/// The unit persisted to the evaluation artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub question_id: String,
    pub question_index: usize,
    pub category: String,
    pub prediction: Option<Prediction>,
    pub ground_truth: Option<GroundTruth>,
    pub score: f64,
    /// `None` for excluded or failed questions.
    pub grade: Option<Grade>,
    pub error: Option<RecordError>,
    /// Left out of the aggregate because the ground truth is missing or malformed.
    pub excluded: bool,
    pub elapsed_ms: u64,
}
