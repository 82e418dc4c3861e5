use async_trait::async_trait;
use std::path::Path;

use crate::types::{IndexDescription, IndexSpec, RetrievalMatch, TextSpan, VectorRecord};

/// Text -> fixed-dimension vector.
///
/// Implementations must return one vector per input, in input order, with
/// `dim()` components each, and must be deterministic for identical text.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;

    async fn embed_documents(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut out = self.embed_documents(&[text.to_string()]).await?;
        out.pop().ok_or_else(|| anyhow::anyhow!("embedder returned no vector for query"))
    }
}

/// A store of named vector indexes.
///
/// `search` results are sorted by descending score with ties resolved by
/// insertion recency; see [`crate::ranking::rank_matches`].
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the index if absent. Fails with `Error::IndexConfigMismatch` when
    /// an index of that name exists with another dimension or metric.
    async fn ensure_index(&self, spec: &IndexSpec) -> crate::Result<()>;

    /// Insert or replace records by id, as one batch.
    async fn upsert(&self, index: &str, records: Vec<VectorRecord>) -> anyhow::Result<()>;

    /// Upsert `records` and, in the same operation, delete every other record
    /// whose id starts with `<document_key>:`. Used on re-ingestion so a
    /// shortened document leaves no stale chunks.
    async fn replace_document(&self, index: &str, document_key: &str, records: Vec<VectorRecord>) -> anyhow::Result<()>;

    async fn search(&self, index: &str, query: &[f32], k: usize) -> anyhow::Result<Vec<RetrievalMatch>>;

    async fn describe_index(&self, name: &str) -> anyhow::Result<Option<IndexDescription>>;
}

/// A format-specific text extractor registered with the loader.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Format tag, e.g. `pdf`.
    fn format(&self) -> &str;

    /// Lower-case file extensions without the dot.
    fn extensions(&self) -> &[&str];

    fn mime_types(&self) -> &[&str] {
        &[]
    }

    async fn extract(&self, path: &Path) -> anyhow::Result<Vec<TextSpan>>;
}

/// Black-box text generation conditioned on retrieved context.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, question: &str, context: &str) -> anyhow::Result<String>;
}
