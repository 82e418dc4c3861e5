//! Format dispatch for document loading.
//!
//! Extractors register the extensions and MIME types they handle; `load`
//! picks one by MIME hint first, then by file extension.

mod docx;
mod pdf;
mod text;

pub use docx::{document_xml_to_text, DocxExtractor};
pub use pdf::{split_pdf_pages, PdfExtractor};
pub use text::PlainTextExtractor;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::Extractor;
use crate::types::TextSpan;

#[derive(Clone, Default)]
pub struct LoaderRegistry {
    extractors: HashMap<String, Arc<dyn Extractor>>,
    by_extension: HashMap<String, String>,
    by_mime: HashMap<String, String>,
}

impl LoaderRegistry {
    pub fn new() -> Self { Self::default() }

    /// Registry with the plain text, PDF and DOCX extractors.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register(Arc::new(PlainTextExtractor))
            .register(Arc::new(PdfExtractor))
            .register(Arc::new(DocxExtractor));
        registry
    }

    /// Add an extractor. A later registration for the same extension or MIME
    /// type replaces the earlier one.
    pub fn register(&mut self, extractor: Arc<dyn Extractor>) -> &mut Self {
        let tag = extractor.format().to_string();
        for ext in extractor.extensions() {
            self.by_extension.insert(ext.to_ascii_lowercase(), tag.clone());
        }
        for mime in extractor.mime_types() {
            self.by_mime.insert(mime.to_ascii_lowercase(), tag.clone());
        }
        self.extractors.insert(tag, extractor);
        self
    }

    pub fn formats(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.extractors.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    pub fn supports_path(&self, path: &Path) -> bool {
        self.resolve(path, None).is_ok()
    }

    pub fn resolve(&self, path: &Path, mime_hint: Option<&str>) -> Result<Arc<dyn Extractor>> {
        let by_mime = mime_hint
            .map(normalize_mime)
            .and_then(|mime| self.by_mime.get(&mime));
        let by_ext = || {
            path.extension()
                .and_then(|e| e.to_str())
                .and_then(|e| self.by_extension.get(&e.to_ascii_lowercase()))
        };
        by_mime
            .or_else(by_ext)
            .and_then(|tag| self.extractors.get(tag))
            .cloned()
            .ok_or_else(|| {
                let what = match (mime_hint, path.extension().and_then(|e| e.to_str())) {
                    (Some(m), Some(e)) => format!("{m} (.{e})"),
                    (Some(m), None) => m.to_string(),
                    (None, Some(e)) => format!(".{e}"),
                    (None, None) => path.display().to_string(),
                };
                Error::UnsupportedFormat(what)
            })
    }

    /// Extract the ordered text spans of a document.
    pub async fn load(&self, path: &Path, mime_hint: Option<&str>) -> Result<Vec<TextSpan>> {
        let extractor = self.resolve(path, mime_hint)?;
        debug!(path = %path.display(), format = extractor.format(), "extracting document");
        let spans = extractor.extract(path).await.map_err(|source| Error::Extraction {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), spans = spans.len(), "extracted document");
        Ok(spans)
    }
}

fn normalize_mime(mime: &str) -> String {
    mime.split(';').next().unwrap_or(mime).trim().to_ascii_lowercase()
}
