use std::sync::Arc;

use docqa_core::chunker::Chunker;
use docqa_core::config::Settings;
use docqa_core::loader::LoaderRegistry;
use docqa_core::traits::{Embedder, Generator, VectorIndex};
use docqa_core::types::{IndexDescription, IndexSpec};
use docqa_core::{Error, Result};

use crate::ingest::IngestionPipeline;
use crate::retrieve::{RetrievalOptions, RetrievalPipeline};

/// Settings plus the concrete collaborators, wired once.
#[derive(Clone)]
pub struct RagContext {
    settings: Settings,
    loaders: LoaderRegistry,
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn Generator>,
}

impl RagContext {
    /// Validates the settings and checks the embedder against the index dimension.
    pub fn new(
        settings: Settings,
        loaders: LoaderRegistry,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        settings.validate()?;
        if embedder.dim() != settings.index.dimension {
            return Err(Error::DimensionMismatch { expected: settings.index.dimension, actual: embedder.dim() });
        }
        let chunker = Chunker::from_settings(&settings.chunking)?;
        Ok(Self { settings, loaders, chunker, embedder, index, generator })
    }

    pub fn settings(&self) -> &Settings { &self.settings }

    pub fn index_spec(&self) -> IndexSpec { self.settings.index_spec() }

    pub fn embedder(&self) -> &Arc<dyn Embedder> { &self.embedder }

    pub fn index(&self) -> &Arc<dyn VectorIndex> { &self.index }

    /// Create the configured index if needed.
    pub async fn prepare(&self) -> Result<()> {
        self.index.ensure_index(&self.index_spec()).await
    }

    pub async fn describe_index(&self) -> Result<IndexDescription> {
        let spec = self.index_spec();
        self.index
            .describe_index(&spec.name)
            .await
            .map_err(Error::Retrieval)?
            .ok_or_else(|| Error::NotFound(format!("index '{}'", spec.name)))
    }

    pub fn ingestion(&self) -> IngestionPipeline {
        IngestionPipeline::new(
            self.loaders.clone(),
            self.chunker,
            self.embedder.clone(),
            self.index.clone(),
            self.index_spec(),
        )
    }

    pub fn retrieval(&self) -> RetrievalPipeline {
        RetrievalPipeline::new(
            self.embedder.clone(),
            self.index.clone(),
            self.generator.clone(),
            self.index_spec(),
            RetrievalOptions::from(&self.settings.retrieval),
        )
    }
}
