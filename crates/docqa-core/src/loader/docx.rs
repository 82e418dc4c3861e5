use anyhow::Context;
use async_trait::async_trait;
use std::io::{Cursor, Read};
use std::path::Path;

use crate::traits::Extractor;
use crate::types::{SourceRef, TextSpan};

/// Word documents: the text runs of `word/document.xml`, one paragraph per
/// blank-line separated block.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxExtractor;

#[async_trait]
impl Extractor for DocxExtractor {
    fn format(&self) -> &str { "docx" }

    fn extensions(&self) -> &[&str] { &["docx"] }

    fn mime_types(&self) -> &[&str] {
        &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"]
    }

    async fn extract(&self, path: &Path) -> anyhow::Result<Vec<TextSpan>> {
        let bytes = tokio::fs::read(path).await?;
        let xml = tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
            let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).context("not a zip container")?;
            let mut entry = archive.by_name("word/document.xml").context("missing word/document.xml")?;
            let mut xml = String::new();
            entry.read_to_string(&mut xml)?;
            Ok(xml)
        })
        .await??;
        Ok(vec![TextSpan::new(document_xml_to_text(&xml), SourceRef::Document)])
    }
}

/// Pull the visible text out of a WordprocessingML body.
pub fn document_xml_to_text(xml: &str) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut rest = xml;

    while let Some(lt) = rest.find('<') {
        if in_text {
            current.push_str(&unescape(&rest[..lt]));
        }
        let Some(gt) = rest[lt..].find('>') else { break };
        let tag = &rest[lt + 1..lt + gt];
        rest = &rest[lt + gt + 1..];

        let closing = tag.starts_with('/');
        let self_closing = tag.ends_with('/');
        let name = tag
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or_default();
        match name {
            "w:t" => in_text = !closing && !self_closing,
            "w:tab" if !closing => current.push('\t'),
            "w:br" | "w:cr" if !closing => current.push('\n'),
            "w:p" if closing || self_closing => paragraphs.push(std::mem::take(&mut current)),
            _ => {}
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    paragraphs
        .into_iter()
        .map(|p| p.trim_end().to_string())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Decode the five predefined XML entities and numeric character references.
/// Anything unrecognised is kept verbatim.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').and_then(|semi| decode_entity(&rest[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "amp" => Some('&'),
        _ => {
            let code = match name.strip_prefix('#')? {
                hex if hex.starts_with(['x', 'X']) => u32::from_str_radix(&hex[1..], 16).ok()?,
                dec => dec.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}
