//! Domain types shared by the loaders, the chunker, the index adapters and
//! the pipelines.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub type ChunkId = String;

/// Free-form metadata attached to every indexed chunk (string -> any).
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Where a span of text came from inside its document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRef {
    Document,
    /// 1-based page number.
    Page(u32),
    Section(String),
}

impl SourceRef {
    /// Loader-derived metadata fields for this reference.
    pub fn metadata(&self) -> Metadata {
        let mut meta = Metadata::new();
        match self {
            SourceRef::Document => {}
            SourceRef::Page(n) => {
                meta.insert("page".into(), (*n).into());
            }
            SourceRef::Section(label) => {
                meta.insert("section".into(), label.clone().into());
            }
        }
        meta
    }
}

/// One loader-produced unit of text, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub text: String,
    pub source_ref: SourceRef,
}

impl TextSpan {
    pub fn new(text: impl Into<String>, source_ref: SourceRef) -> Self {
        Self { text: text.into(), source_ref }
    }
}

/// A bounded slice of a document's text; the unit of embedding and indexing.
///
/// - `sequence_index`: position within the document, gapless from 0
/// - `char_offset`: start (in chars) of the non-overlapping part within the span
/// - `overlap`: number of leading chars shared with the previous chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub sequence_index: usize,
    pub source_ref: SourceRef,
    pub metadata: Metadata,
    pub char_offset: usize,
    pub overlap: usize,
}

impl Chunk {
    /// The chunk text without the prefix it shares with the previous chunk.
    pub fn fresh_text(&self) -> &str {
        match self.text.char_indices().nth(self.overlap) {
            Some((byte, _)) => &self.text[byte..],
            None if self.overlap == 0 => &self.text,
            None => "",
        }
    }
}

/// A record handed to the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: ChunkId,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: Metadata,
}

/// One similarity search hit. `score` is higher-is-better for every metric.
///
/// `indexed_seq` is assigned by the index on upsert and grows with insertion
/// recency; it breaks score ties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalMatch {
    pub id: ChunkId,
    pub score: f32,
    pub text: String,
    pub metadata: Metadata,
    #[serde(default, skip_serializing)]
    pub indexed_seq: u64,
}

/// The externally visible answer to a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: String,
    pub sources: Vec<RetrievalMatch>,
}

/// A document to ingest plus caller metadata.
#[derive(Debug, Clone, Default)]
pub struct IngestRequest {
    pub source_path: PathBuf,
    pub mime_hint: Option<String>,
    pub metadata: Metadata,
}

impl IngestRequest {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self { source_path: source_path.into(), ..Self::default() }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime_hint = Some(mime.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResult {
    pub chunk_count: usize,
    pub document_key: String,
}

/// Similarity metric of a vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    Dot,
    Euclidean,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::Dot => "dot",
            Metric::Euclidean => "euclidean",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Metric::Cosine),
            "dot" | "dotproduct" => Ok(Metric::Dot),
            "euclidean" | "l2" => Ok(Metric::Euclidean),
            other => Err(crate::error::Error::InvalidConfig(format!("unknown metric '{other}'"))),
        }
    }
}

/// Requested shape of a named index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
}

/// What an index reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescription {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
    pub count: usize,
}
