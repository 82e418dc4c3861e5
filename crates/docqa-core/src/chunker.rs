//! Overlapping, boundary-aware text chunking.
//!
//! Each chunk ends on the coarsest natural boundary that fits the size budget:
//! paragraph break, then line break, then sentence end, then whitespace, then
//! a hard cut. Separators stay attached to the left piece, so dropping each
//! chunk's `overlap` prefix and concatenating rebuilds the input exactly.
//! Sizes are counted in chars.

use crate::config::ChunkingSettings;
use crate::error::{Error, Result};
use crate::types::{Chunk, Metadata, SourceRef, TextSpan};

const SEPARATOR_LEVELS: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "! ", "? "], &[" ", "\t"]];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be greater than 0".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    pub fn from_settings(settings: &ChunkingSettings) -> Result<Self> {
        Self::new(settings.chunk_size, settings.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize { self.chunk_size }

    pub fn chunk_overlap(&self) -> usize { self.chunk_overlap }

    /// Split free text; chunks carry `SourceRef::Document`.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        self.split_text(text, &SourceRef::Document)
    }

    /// Split one loader span, keeping its source reference on every chunk.
    pub fn split_span(&self, span: &TextSpan) -> Vec<Chunk> {
        self.split_text(&span.text, &span.source_ref)
    }

    fn split_text(&self, text: &str, source_ref: &SourceRef) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }
        // byte offset of every char boundary, end included
        let bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
        let total = bounds.len() - 1;

        let mut chunks = Vec::new();
        let mut start = 0usize;
        while start < total {
            let overlap = if start == 0 { 0 } else { self.chunk_overlap.min(start) };
            let budget = self.chunk_size - overlap;
            let end = if total - start <= budget {
                total
            } else {
                find_boundary(text, &bounds, start, start + budget)
            };
            let from = start - overlap;
            chunks.push(Chunk {
                text: text[bounds[from]..bounds[end]].to_string(),
                sequence_index: chunks.len(),
                source_ref: source_ref.clone(),
                metadata: Metadata::new(),
                char_offset: start,
                overlap,
            });
            start = end;
        }
        chunks
    }
}

/// Pick the char index in `(start, limit]` where the next raw span ends.
fn find_boundary(text: &str, bounds: &[usize], start: usize, limit: usize) -> usize {
    let base = bounds[start];
    let window = &text[base..bounds[limit]];
    for level in SEPARATOR_LEVELS {
        let cut = level
            .iter()
            .filter_map(|sep| window.rfind(sep).map(|pos| pos + sep.len()))
            .max();
        if let Some(cut) = cut {
            // separators are ASCII, so the cut is always a char boundary
            if let Ok(idx) = bounds.binary_search(&(base + cut)) {
                if idx > start {
                    return idx;
                }
            }
        }
    }
    limit
}

/// Convenience wrapper: validate the parameters and split `text`.
pub fn split(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<Chunk>> {
    Ok(Chunker::new(chunk_size, chunk_overlap)?.split(text))
}
