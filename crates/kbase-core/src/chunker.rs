//! Character-window chunker with word-boundary back-off and fixed overlap.

use crate::config::ChunkingConfig;
use crate::types::{Chunk, Document};

/// A window may be pulled back to the last space only if that space lies past
/// this fraction of the window; otherwise the hard cut is kept.
const WORD_BREAK_MIN_FRACTION: f64 = 0.7;

#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self { Self { config } }

    pub fn config(&self) -> ChunkingConfig { self.config }

    /// Split a document into chunks in strictly increasing sequence order.
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let chars: Vec<char> = document.text.chars().collect();
        let spans = char_spans(&chars, self.config.chunk_size, self.config.overlap);
        let is_fragment = spans.len() > 1 || chars.len() > self.config.chunk_size;
        spans
            .into_iter()
            .enumerate()
            .map(|(chunk_index, (start, end))| {
                let text: String = chars[start..end].iter().collect();
                Chunk {
                    id: format!("{}_chunk_{}", document.id, chunk_index),
                    doc_id: document.id.clone(),
                    chunk_index,
                    char_count: end - start,
                    word_count: text.split_whitespace().count(),
                    text,
                    title: document.title.clone(),
                    category: document.category.clone(),
                    filename: document.filename.clone(),
                    relative_path: document.relative_path.clone(),
                    is_fragment,
                }
            })
            .collect()
    }
}

/// Character spans `[start, end)` the chunker would cut `text` into.
pub fn split_spans(text: &str, chunk_size: usize, overlap: usize) -> Vec<(usize, usize)> {
    let chars: Vec<char> = text.chars().collect();
    char_spans(&chars, chunk_size, overlap)
}

fn char_spans(chars: &[char], chunk_size: usize, overlap: usize) -> Vec<(usize, usize)> {
    let len = chars.len();
    if len == 0 {
        return Vec::new();
    }
    let chunk_size = chunk_size.max(1);
    if len <= chunk_size {
        return vec![(0, len)];
    }

    let min_break = chunk_size as f64 * WORD_BREAK_MIN_FRACTION;
    let mut spans = Vec::new();
    let mut start = 0usize;
    while start < len {
        let mut end = (start + chunk_size).min(len);
        if end < len {
            if let Some(last_space) = chars[start..end].iter().rposition(|c| *c == ' ') {
                // a back-off that would stall the next window keeps the hard cut
                if last_space as f64 > min_break && last_space > overlap {
                    end = start + last_space;
                }
            }
        }
        spans.push((start, end));
        if end >= len {
            break;
        }
        let next = end.saturating_sub(overlap);
        if next <= start {
            tracing::warn!(start, end, overlap, "chunk window does not advance; stopping early");
            break;
        }
        start = next;
    }
    spans
}
