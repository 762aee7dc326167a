#[cfg(test)]
mod tests;

use std::collections::VecDeque;

use tracing::debug;

use crate::config::RetrievalConfig;
use crate::documents::SourceDocument;
use crate::index::DocumentChunk;

/// Separator hierarchy, coarsest first: markdown headings, list items,
/// newlines, then single spaces
pub const SEPARATORS: &[&str] = &["\n##", "\n#", "\n- ", "\n", " "];

/// A contiguous piece of the source text with its byte offset
#[derive(Debug, Clone)]
struct Piece {
    offset: usize,
    text: String,
}

/// Split a document into chunks within the configured character budget,
/// with adjacent chunks overlapping by up to `chunk_overlap` characters.
///
/// Splitting prefers coarse structural boundaries (headings, list items)
/// and only falls back to finer separators for oversized sections. Each
/// chunk records the byte offset of its content within the source.
#[inline]
pub fn split_document(document: &SourceDocument, config: &RetrievalConfig) -> Vec<DocumentChunk> {
    let pieces = split_text(0, &document.content, SEPARATORS, config.chunk_size);
    let source = document.path.display().to_string();

    let chunks: Vec<DocumentChunk> = merge_pieces(&pieces, config)
        .into_iter()
        .enumerate()
        .map(|(i, (offset, content))| DocumentChunk {
            content,
            source: source.clone(),
            offset,
            chunk_index: i as u32,
        })
        .collect();

    debug!(
        "Split document {} into {} chunks",
        document.path.display(),
        chunks.len()
    );
    chunks
}

fn split_text(offset: usize, text: &str, separators: &[&str], budget: usize) -> Vec<Piece> {
    if text.len() <= budget {
        return vec![Piece {
            offset,
            text: text.to_string(),
        }];
    }

    let Some((separator, rest)) = separators.split_first() else {
        return hard_split(offset, text, budget);
    };

    // A separator at position zero would produce an empty leading piece;
    // the separator stays attached to the piece that follows it
    let cut_points: Vec<usize> = text
        .match_indices(separator)
        .map(|(i, _)| i)
        .filter(|&i| i > 0)
        .collect();

    if cut_points.is_empty() {
        return split_text(offset, text, rest, budget);
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for cut in cut_points {
        if let Some(segment) = text.get(start..cut) {
            push_segment(&mut pieces, offset + start, segment, rest, budget);
        }
        start = cut;
    }
    if let Some(segment) = text.get(start..) {
        push_segment(&mut pieces, offset + start, segment, rest, budget);
    }

    pieces
}

fn push_segment(
    pieces: &mut Vec<Piece>,
    offset: usize,
    segment: &str,
    separators: &[&str],
    budget: usize,
) {
    if segment.len() <= budget {
        pieces.push(Piece {
            offset,
            text: segment.to_string(),
        });
    } else {
        pieces.extend(split_text(offset, segment, separators, budget));
    }
}

/// Last resort for text with no remaining separators: cut at character
/// boundaries as close to the budget as possible
fn hard_split(offset: usize, text: &str, budget: usize) -> Vec<Piece> {
    let budget = budget.max(1);
    let mut pieces = Vec::new();
    let mut start = 0;

    for (idx, _) in text.char_indices() {
        if idx - start >= budget {
            if let Some(segment) = text.get(start..idx) {
                pieces.push(Piece {
                    offset: offset + start,
                    text: segment.to_string(),
                });
            }
            start = idx;
        }
    }

    if start < text.len() {
        if let Some(segment) = text.get(start..) {
            pieces.push(Piece {
                offset: offset + start,
                text: segment.to_string(),
            });
        }
    }

    pieces
}

/// Greedily pack pieces into chunks up to the budget, carrying a tail of
/// pieces within the overlap budget into the next chunk
fn merge_pieces(pieces: &[Piece], config: &RetrievalConfig) -> Vec<(usize, String)> {
    let mut chunks = Vec::new();
    let mut current: VecDeque<&Piece> = VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        let len = piece.text.len();

        if total + len > config.chunk_size && !current.is_empty() {
            if let Some(chunk) = assemble(&current) {
                chunks.push(chunk);
            }

            while total > config.chunk_overlap
                || (total + len > config.chunk_size && total > 0)
            {
                let Some(front) = current.pop_front() else {
                    break;
                };
                total -= front.text.len();
            }
        }

        current.push_back(piece);
        total += len;
    }

    if let Some(chunk) = assemble(&current) {
        chunks.push(chunk);
    }

    chunks
}

/// Join buffered pieces into a trimmed chunk; whitespace-only buffers are
/// dropped and the offset accounts for trimmed leading whitespace
fn assemble(pieces: &VecDeque<&Piece>) -> Option<(usize, String)> {
    let first = pieces.front()?;
    let text: String = pieces.iter().map(|p| p.text.as_str()).collect();

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let leading = text.len() - text.trim_start().len();
    Some((first.offset + leading, trimmed.to_string()))
}
