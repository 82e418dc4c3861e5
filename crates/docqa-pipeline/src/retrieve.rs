use std::sync::Arc;
use tracing::{debug, error, info};

use docqa_core::config::{FailureMode, RetrievalSettings};
use docqa_core::traits::{Embedder, Generator, VectorIndex};
use docqa_core::types::{AnswerResult, IndexSpec, RetrievalMatch};
use docqa_core::{Error, Result};

use crate::context::assemble_context;

/// Answer returned in degraded mode when any collaborator fails.
pub const APOLOGY: &str = "Sorry, I couldn't process your question.";

#[derive(Debug, Clone, Copy)]
pub struct RetrievalOptions {
    pub default_k: usize,
    pub max_context_chars: usize,
    pub failure_mode: FailureMode,
}

impl Default for RetrievalOptions {
    fn default() -> Self { Self::from(&RetrievalSettings::default()) }
}

impl From<&RetrievalSettings> for RetrievalOptions {
    fn from(s: &RetrievalSettings) -> Self {
        Self { default_k: s.default_k, max_context_chars: s.max_context_chars, failure_mode: s.failure_mode }
    }
}

pub struct RetrievalPipeline {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn Generator>,
    spec: IndexSpec,
    options: RetrievalOptions,
}

impl RetrievalPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn Generator>,
        spec: IndexSpec,
        options: RetrievalOptions,
    ) -> Self {
        Self { embedder, index, generator, spec, options }
    }

    pub fn options(&self) -> &RetrievalOptions { &self.options }

    pub fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.options.failure_mode = mode;
        self
    }

    /// Embed the question and return the top `k` matches (default `default_k`).
    pub async fn retrieve(&self, question: &str, k: Option<usize>) -> Result<Vec<RetrievalMatch>> {
        let k = k.unwrap_or(self.options.default_k);
        let query = self.embedder.embed_query(question).await.map_err(Error::Retrieval)?;
        if query.len() != self.spec.dimension {
            return Err(Error::DimensionMismatch { expected: self.spec.dimension, actual: query.len() });
        }
        let matches = self.index.search(&self.spec.name, &query, k).await.map_err(Error::Retrieval)?;
        debug!(k, hits = matches.len(), "retrieved matches");
        Ok(matches)
    }

    /// Retrieve, assemble context and generate an answer.
    ///
    /// In [`FailureMode::Degraded`] collaborator failures yield [`APOLOGY`]
    /// with no sources; a dimension mismatch always propagates.
    pub async fn answer(&self, question: &str, k: Option<usize>) -> Result<AnswerResult> {
        match self.run(question, k).await {
            Ok(result) => {
                info!(question = %question, sources = result.sources.len(), "answered question");
                Ok(result)
            }
            Err(e @ Error::DimensionMismatch { .. }) => {
                error!(question = %question, collaborator = e.collaborator(), error = %e, "embedding dimension does not match index");
                Err(e)
            }
            Err(e) => {
                error!(question = %question, collaborator = e.collaborator(), error = %e, "question failed");
                match self.options.failure_mode {
                    FailureMode::Strict => Err(e),
                    FailureMode::Degraded => Ok(AnswerResult { answer: APOLOGY.to_string(), sources: Vec::new() }),
                }
            }
        }
    }

    async fn run(&self, question: &str, k: Option<usize>) -> Result<AnswerResult> {
        let sources = self.retrieve(question, k).await?;
        let context = assemble_context(&sources, self.options.max_context_chars);
        debug!(context_chars = context.chars().count(), "generating answer");
        let answer = self.generator.generate(question, &context).await.map_err(Error::Generation)?;
        Ok(AnswerResult { answer, sources })
    }
}
