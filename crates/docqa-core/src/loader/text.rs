use async_trait::async_trait;
use std::path::Path;

use crate::traits::Extractor;
use crate::types::{SourceRef, TextSpan};

/// Plain text and markdown files, read as UTF-8 with a lossy fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

#[async_trait]
impl Extractor for PlainTextExtractor {
    fn format(&self) -> &str { "text" }

    fn extensions(&self) -> &[&str] { &["txt", "text", "md", "markdown"] }

    fn mime_types(&self) -> &[&str] { &["text/plain", "text/markdown"] }

    async fn extract(&self, path: &Path) -> anyhow::Result<Vec<TextSpan>> {
        let bytes = tokio::fs::read(path).await?;
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };
        let text = text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text);
        Ok(vec![TextSpan::new(text, SourceRef::Document)])
    }
}
