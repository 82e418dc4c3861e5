//! Ingestion and question answering over the collaborator ports.
//!
//! [`RagContext`] is built once at start-up from settings and the concrete
//! adapters; it hands out [`IngestionPipeline`] and [`RetrievalPipeline`].

mod context;
mod ingest;
mod rag;
mod retrieve;

pub use context::{assemble_context, CONTEXT_SEPARATOR};
pub use ingest::{chunk_id, document_key, IngestionPipeline};
pub use rag::RagContext;
pub use retrieve::{RetrievalOptions, RetrievalPipeline, APOLOGY};
