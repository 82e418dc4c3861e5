use anyhow::{anyhow, bail};
use async_trait::async_trait;
use std::path::Path;

use crate::traits::Extractor;
use crate::types::{SourceRef, TextSpan};

/// PDF text via `pdf-extract`, one span per non-empty page.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

#[async_trait]
impl Extractor for PdfExtractor {
    fn format(&self) -> &str { "pdf" }

    fn extensions(&self) -> &[&str] { &["pdf"] }

    fn mime_types(&self) -> &[&str] { &["application/pdf"] }

    async fn extract(&self, path: &Path) -> anyhow::Result<Vec<TextSpan>> {
        let bytes = tokio::fs::read(path).await?;
        // pdf-extract is CPU bound and blocking
        let text = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem(&bytes).map_err(|e| anyhow!("pdf-extract: {e}"))
        })
        .await??;
        let pages = split_pdf_pages(&text);
        if pages.is_empty() {
            bail!("no extractable text (scanned or image-only PDF?)");
        }
        Ok(pages)
    }
}

/// Split extracted PDF text on form feeds; page numbers are 1-based and keep
/// their position even when blank pages are dropped.
pub fn split_pdf_pages(text: &str) -> Vec<TextSpan> {
    text.split('\x0C')
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(i, page)| TextSpan::new(page.trim(), SourceRef::Page(i as u32 + 1)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_split_on_form_feed() {
        let pages = split_pdf_pages("first page\x0C\x0C  third page  \n");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0], TextSpan::new("first page", SourceRef::Page(1)));
        assert_eq!(pages[1], TextSpan::new("third page", SourceRef::Page(3)));
    }

    #[test]
    fn no_form_feed_is_one_page() {
        let pages = split_pdf_pages("just text");
        assert_eq!(pages, vec![TextSpan::new("just text", SourceRef::Page(1))]);
    }

    #[test]
    fn whitespace_only_has_no_pages() {
        assert!(split_pdf_pages(" \n\x0C\t").is_empty());
    }
}
