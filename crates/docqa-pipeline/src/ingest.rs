use anyhow::anyhow;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};

use docqa_core::chunker::Chunker;
use docqa_core::loader::LoaderRegistry;
use docqa_core::traits::{Embedder, VectorIndex};
use docqa_core::types::{Chunk, IndexSpec, IngestRequest, IngestResult, Metadata, VectorRecord};
use docqa_core::{Error, Result};

/// First 16 hex chars of `blake3(doc_id)`.
pub fn document_key(doc_id: &str) -> String {
    blake3::hash(doc_id.as_bytes()).to_hex().as_str()[..16].to_string()
}

pub fn chunk_id(document_key: &str, sequence_index: usize) -> String {
    format!("{document_key}:{sequence_index}")
}

/// Load -> chunk -> embed -> upsert for one document at a time.
pub struct IngestionPipeline {
    loaders: LoaderRegistry,
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    spec: IndexSpec,
}

impl IngestionPipeline {
    pub fn new(
        loaders: LoaderRegistry,
        chunker: Chunker,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        spec: IndexSpec,
    ) -> Self {
        Self { loaders, chunker, embedder, index, spec }
    }

    pub fn loaders(&self) -> &LoaderRegistry { &self.loaders }

    /// Ingest one document. Either every chunk is written in a single write,
    /// replacing whatever an earlier ingestion of the same document left, or
    /// nothing is.
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestResult> {
        let path = request.source_path.display().to_string();
        let result = self.run(&request, &path).await;
        match &result {
            Ok(r) => info!(path = %path, chunks = r.chunk_count, document_key = %r.document_key, "ingested document"),
            Err(e) => error!(path = %path, collaborator = e.collaborator(), error = %e, "ingestion failed"),
        }
        result
    }

    async fn run(&self, request: &IngestRequest, path: &str) -> Result<IngestResult> {
        let spans = self.loaders.load(&request.source_path, request.mime_hint.as_deref()).await?;

        let doc_id = match request.metadata.get("doc_id") {
            Some(Value::String(id)) => id.clone(),
            _ => path.to_string(),
        };
        let key = document_key(&doc_id);

        let mut chunks: Vec<Chunk> = Vec::new();
        for span in &spans {
            for mut chunk in self.chunker.split_span(span) {
                chunk.sequence_index = chunks.len();
                chunk.metadata = chunk_metadata(&chunk, path, &request.metadata, &key);
                chunks.push(chunk);
            }
        }
        if chunks.is_empty() {
            info!(path = %path, "document has no text; nothing to index");
            return Ok(IngestResult { chunk_count: 0, document_key: key });
        }
        debug!(path = %path, spans = spans.len(), chunks = chunks.len(), "chunked document");

        self.index.ensure_index(&self.spec).await?;

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_documents(&texts).await.map_err(Error::Embedding)?;
        if vectors.len() != chunks.len() {
            return Err(Error::Embedding(anyhow!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }
        if let Some(v) = vectors.iter().find(|v| v.len() != self.spec.dimension) {
            return Err(Error::DimensionMismatch { expected: self.spec.dimension, actual: v.len() });
        }

        let records: Vec<VectorRecord> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| VectorRecord {
                id: chunk_id(&key, chunk.sequence_index),
                vector,
                text: chunk.text,
                metadata: chunk.metadata,
            })
            .collect();
        let chunk_count = records.len();

        // chunks left over from a longer earlier version go in the same write
        debug!(path = %path, index = %self.spec.name, records = chunk_count, "replacing document chunks");
        self.index.replace_document(&self.spec.name, &key, records).await.map_err(Error::IndexWrite)?;

        Ok(IngestResult { chunk_count, document_key: key })
    }
}

/// Loader fields, then caller metadata (caller wins), then the stamped
/// `sequence_index` and `chunk_id`.
fn chunk_metadata(chunk: &Chunk, path: &str, caller: &Metadata, key: &str) -> Metadata {
    let mut meta = Metadata::new();
    meta.insert("source".into(), Value::String(path.to_string()));
    meta.extend(chunk.source_ref.metadata());
    meta.extend(caller.iter().map(|(k, v)| (k.clone(), v.clone())));
    meta.insert("sequence_index".into(), chunk.sequence_index.into());
    meta.insert("chunk_id".into(), Value::String(chunk_id(key, chunk.sequence_index)));
    meta
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_key_is_stable_hex() {
        let a = document_key("docs/report.pdf");
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a, document_key("docs/report.pdf"));
        assert_ne!(a, document_key("docs/other.pdf"));
        assert_eq!(chunk_id(&a, 4), format!("{a}:4"));
    }
}
