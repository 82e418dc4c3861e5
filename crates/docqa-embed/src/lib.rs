//! Embedding adapters: local BGE-M3 on candle, Ollama over HTTP, and a
//! deterministic hashing embedder.

mod device;
mod hash;
mod model;
mod ollama;
mod pool;
mod tokenize;

pub use device::select_device;
pub use hash::HashEmbedder;
pub use model::{EmbeddingModel, LocalEmbedder, BGE_M3_DIM};
pub use ollama::OllamaEmbedder;
pub use pool::masked_mean_l2;
pub use tokenize::tokenize_on_device;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use docqa_core::config::{EmbeddingProvider, EmbeddingSettings};
use docqa_core::traits::Embedder;

/// Build the configured embedder. `dim` is the index dimension; adapters
/// with a fixed model dimension ignore it and are checked by the pipelines.
pub fn from_settings(settings: &EmbeddingSettings, dim: usize) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match settings.provider {
        EmbeddingProvider::Local => Arc::new(LocalEmbedder::new(settings.model_dir.as_deref())?),
        EmbeddingProvider::Ollama => Arc::new(OllamaEmbedder::new(&settings.url, &settings.model, dim)),
        EmbeddingProvider::Hash => Arc::new(HashEmbedder::new(dim)),
    };
    info!(provider = ?settings.provider, dim = embedder.dim(), "embedder ready");
    Ok(embedder)
}
