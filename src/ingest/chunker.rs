use super::parsers::ParsedDocument;
use crate::config::PerformanceConfig;

/// Approximate characters per token.
const CHARS_PER_TOKEN: usize = 4;

/// A chunk of text ready for embedding
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub tokens: usize,
    pub section_header: Option<String>,
}

/// Chunk every section of a parsed document. Chunks never span sections.
pub fn chunk_document(parsed: &ParsedDocument, config: &PerformanceConfig) -> Vec<Chunk> {
    parsed
        .sections
        .iter()
        .flat_map(|section| {
            let header = (!section.header.is_empty()).then(|| section.header.clone());
            chunk_text(&section.content, config.chunk_size_tokens, config.chunk_overlap_tokens)
                .into_iter()
                .map(move |text| Chunk {
                    tokens: estimate_tokens(&text),
                    text,
                    section_header: header.clone(),
                })
        })
        .collect()
}

/// Largest char boundary at or before `pos`.
fn floor_boundary(text: &str, pos: usize) -> usize {
    if pos >= text.len() {
        return text.len();
    }
    (0..=pos).rev().find(|&i| text.is_char_boundary(i)).unwrap_or(0)
}

/// Chunk text with overlap.
///
/// Sizes are approximated at ~4 characters per token. Chunk ends are pulled
/// back to the last whitespace or sentence punctuation within the final 20% of
/// the window. All slicing happens on char boundaries.
pub fn chunk_text(text: &str, size_tokens: usize, overlap_tokens: usize) -> Vec<String> {
    if text.trim().is_empty() || size_tokens == 0 {
        return Vec::new();
    }

    let char_size = size_tokens * CHARS_PER_TOKEN;
    let char_overlap = overlap_tokens * CHARS_PER_TOKEN;

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let end = floor_boundary(text, start + char_size);

        let chunk_end = if end < text.len() {
            let search_start = floor_boundary(text, end.saturating_sub(char_size / 5)).max(start);
            text[search_start..end]
                .char_indices()
                .rev()
                .find(|(_, c)| c.is_whitespace() || matches!(c, '.' | '!' | '?'))
                .map(|(offset, c)| search_start + offset + c.len_utf8())
                .filter(|&boundary| boundary > start)
                .unwrap_or(end)
        } else {
            end
        };

        // A window narrower than one character still has to advance.
        let chunk_end = if chunk_end <= start {
            text[start..]
                .chars()
                .next()
                .map_or(text.len(), |c| start + c.len_utf8())
        } else {
            chunk_end
        };

        let piece = text[start..chunk_end].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        if chunk_end >= text.len() {
            break;
        }

        let next_start = floor_boundary(text, chunk_end.saturating_sub(char_overlap));
        start = if next_start > start { next_start } else { chunk_end };
    }

    chunks
}

/// Estimate token count from text (~4 characters per token, rounded up).
pub fn estimate_tokens(text: &str) -> usize {
    (text.len() + CHARS_PER_TOKEN - 1) / CHARS_PER_TOKEN
}
