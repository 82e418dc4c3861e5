//! Core of the document Q&A system: domain types, the error taxonomy,
//! collaborator ports, configuration, chunking and loader dispatch.

pub mod chunker;
pub mod config;
pub mod error;
pub mod loader;
pub mod ranking;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
