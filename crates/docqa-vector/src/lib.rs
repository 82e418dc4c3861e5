//! Vector index adapters.
//!
//! [`LanceVectorIndex`] persists to a local LanceDB directory;
//! [`InMemoryIndex`] keeps everything in process.

pub mod schema;
pub mod table;

mod lance;
mod memory;

pub use lance::{LanceVectorIndex, META_TABLE};
pub use memory::InMemoryIndex;

use anyhow::Result;
use std::sync::Arc;

use docqa_core::config::{expand_path, IndexBackend, IndexSettings};
use docqa_core::traits::VectorIndex;

/// Open the index backend selected in settings.
pub async fn from_settings(settings: &IndexSettings) -> Result<Arc<dyn VectorIndex>> {
    Ok(match settings.backend {
        IndexBackend::Lancedb => {
            let uri = expand_path(&settings.uri);
            Arc::new(LanceVectorIndex::open(&uri.to_string_lossy()).await?)
        }
        IndexBackend::Memory => Arc::new(InMemoryIndex::new()),
    })
}
