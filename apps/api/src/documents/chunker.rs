//! Page chunking for retrieval.
//!
//! Each page is split on the coarsest boundary that fits (paragraph, line,
//! sentence, clause, word) and the pieces are packed greedily into chunks of
//! at most `MAX_CHUNK_CHARS` characters. Chunks never cross page boundaries,
//! so a chunk's source id `"{page}-{chunk}"` always points at one page.

use serde::Serialize;

use super::{Page, ParsedDocument};

/// Maximum characters per chunk.
pub const MAX_CHUNK_CHARS: usize = 800;

/// Split points, coarsest first.
const SEPARATORS: &[&str] = &["\n\n", "\n", ".", "!", "?", ",", " "];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub content: String,
    pub page: u32,
    /// Position of the chunk within its page, starting at 0.
    pub chunk: u32,
    /// Citation id, e.g. `"3-12"` for the 13th chunk on page 3.
    pub source: String,
}

pub fn chunk_document(doc: &ParsedDocument) -> Vec<Chunk> {
    chunk_pages(&doc.pages, MAX_CHUNK_CHARS)
}

pub fn chunk_pages(pages: &[Page], max_chars: usize) -> Vec<Chunk> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();

    for page in pages {
        let pieces = split_recursive(&page.text, SEPARATORS, max_chars);
        let non_empty = pieces
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty());

        for (index, content) in non_empty.enumerate() {
            chunks.push(Chunk {
                content: content.to_string(),
                page: page.number,
                chunk: index as u32,
                source: format!("{}-{}", page.number, index),
            });
        }
    }

    chunks
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn split_recursive(text: &str, separators: &[&str], max_chars: usize) -> Vec<String> {
    if char_len(text) <= max_chars {
        return vec![text.to_string()];
    }

    let Some(position) = separators.iter().position(|sep| text.contains(sep)) else {
        return hard_split(text, max_chars);
    };
    let separator = separators[position];
    let finer = &separators[position + 1..];

    let mut out = Vec::new();
    let mut buffer = String::new();
    let mut buffer_len = 0;

    for piece in text.split_inclusive(separator) {
        let piece_len = char_len(piece);

        if piece_len > max_chars {
            if !buffer.is_empty() {
                out.push(std::mem::take(&mut buffer));
                buffer_len = 0;
            }
            out.extend(split_recursive(piece, finer, max_chars));
        } else if buffer_len + piece_len > max_chars {
            out.push(std::mem::replace(&mut buffer, piece.to_string()));
            buffer_len = piece_len;
        } else {
            buffer.push_str(piece);
            buffer_len += piece_len;
        }
    }

    if !buffer.is_empty() {
        out.push(buffer);
    }

    out
}

/// Last resort for text with no separators at all: cut on char boundaries.
fn hard_split(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|c| c.iter().collect())
        .collect()
}
