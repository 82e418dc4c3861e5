use thiserror::Error;

use crate::types::Metric;

/// Failure taxonomy shared by the ingestion and retrieval pipelines.
///
/// Collaborator adapters report `anyhow` errors; the pipelines classify them
/// into one of these kinds so callers can match on what failed.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to extract text from {path}: {source}")]
    Extraction {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Embedding failed: {0}")]
    Embedding(#[source] anyhow::Error),

    #[error("Index write failed: {0}")]
    IndexWrite(#[source] anyhow::Error),

    #[error(
        "Index '{name}' exists as dim={actual_dim} metric={actual_metric}, requested dim={expected_dim} metric={expected_metric}"
    )]
    IndexConfigMismatch {
        name: String,
        expected_dim: usize,
        actual_dim: usize,
        expected_metric: Metric,
        actual_metric: Metric,
    },

    #[error("Embedding dimension mismatch: index expects {expected}, embedder returned {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Retrieval failed: {0}")]
    Retrieval(#[source] anyhow::Error),

    #[error("Generation failed: {0}")]
    Generation(#[source] anyhow::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Short collaborator label used in log fields.
    pub fn collaborator(&self) -> &'static str {
        match self {
            Error::UnsupportedFormat(_) | Error::Extraction { .. } => "loader",
            Error::Embedding(_) | Error::DimensionMismatch { .. } => "embedder",
            Error::IndexWrite(_) | Error::IndexConfigMismatch { .. } => "index",
            Error::Retrieval(_) => "retriever",
            Error::Generation(_) => "generator",
            Error::InvalidConfig(_) | Error::NotFound(_) => "core",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
