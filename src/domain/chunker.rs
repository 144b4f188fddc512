//! Recursive text splitting with overlapping windows.
//!
//! Text is cut at the coarsest boundary it contains (paragraph, line, word,
//! then character). Fitting pieces are merged greedily into windows of at most
//! `chunk_size` characters, and each new window starts with the tail of the
//! previous one, at most `chunk_overlap` characters long.
//!
//! Overlap only carries within one run of merged pieces. When a piece is too
//! long and has to be split at a finer boundary, the window flushed before it
//! and the first window cut from it share no text.

use std::collections::VecDeque;
use std::ops::Range;

use crate::domain::{ChunkMetadata, Document, DocumentChunk, DomainError, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// A chunk of text with its byte range in the source string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(DomainError::validation("chunk size must be greater than 0"));
        }
        if chunk_overlap >= chunk_size {
            return Err(DomainError::validation(format!(
                "chunk overlap ({chunk_overlap}) must be smaller than chunk size ({chunk_size})"
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Replaces the boundary list. An empty separator means per-character.
    pub fn with_separators(mut self, separators: Vec<String>) -> Self {
        self.separators = separators;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn split_text(&self, text: &str) -> Vec<TextSpan> {
        let mut ranges = Vec::new();
        self.split_range(text, 0..text.len(), &self.separators, &mut ranges);

        ranges
            .into_iter()
            .map(|range| TextSpan {
                start: range.start,
                end: range.end,
                text: text[range].to_string(),
            })
            .collect()
    }

    pub fn split_documents(&self, documents: &[Document]) -> Vec<DocumentChunk> {
        documents
            .iter()
            .flat_map(|doc| {
                self.split_text(&doc.content)
                    .into_iter()
                    .enumerate()
                    .map(move |(index, span)| {
                        DocumentChunk::new(doc.id, span.text, index)
                            .with_metadata(ChunkMetadata::from_document(&doc.metadata, span.start))
                    })
            })
            .collect()
    }

    fn split_range(
        &self,
        text: &str,
        range: Range<usize>,
        separators: &[String],
        out: &mut Vec<Range<usize>>,
    ) {
        let slice = &text[range.clone()];
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || slice.contains(sep.as_str()));
        let (separator, remaining) = match position {
            Some(i) => (separators[i].as_str(), &separators[i + 1..]),
            None => ("", &separators[separators.len()..]),
        };

        let mut fitting = Vec::new();
        for piece in split_keeping_separator(slice, separator, range.start) {
            if char_len(text, &piece) <= self.chunk_size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                self.merge(text, &fitting, out);
                fitting.clear();
            }

            if remaining.is_empty() {
                let chars = split_keeping_separator(&text[piece.clone()], "", piece.start);
                self.merge(text, &chars, out);
            } else {
                self.split_range(text, piece, remaining, out);
            }
        }

        if !fitting.is_empty() {
            self.merge(text, &fitting, out);
        }
    }

    /// `pieces` must be contiguous so a window is a single byte range.
    fn merge(&self, text: &str, pieces: &[Range<usize>], out: &mut Vec<Range<usize>>) {
        let mut window: VecDeque<(Range<usize>, usize)> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = char_len(text, piece);

            if total + len > self.chunk_size && !window.is_empty() {
                push_trimmed(text, &window, out);

                while total > self.chunk_overlap || (total > 0 && total + len > self.chunk_size) {
                    match window.pop_front() {
                        Some((_, front_len)) => total -= front_len,
                        None => break,
                    }
                }
            }

            window.push_back((piece.clone(), len));
            total += len;
        }

        if !window.is_empty() {
            push_trimmed(text, &window, out);
        }
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn char_len(text: &str, range: &Range<usize>) -> usize {
    text[range.clone()].chars().count()
}

/// Splits `slice` into contiguous ranges (offset by `offset`), each ending
/// with the separator that closed it.
fn split_keeping_separator(slice: &str, separator: &str, offset: usize) -> Vec<Range<usize>> {
    if separator.is_empty() {
        return slice
            .char_indices()
            .map(|(i, c)| offset + i..offset + i + c.len_utf8())
            .collect();
    }

    let mut pieces = Vec::new();
    let mut last = 0;
    for (idx, matched) in slice.match_indices(separator) {
        let end = idx + matched.len();
        if end > last {
            pieces.push(offset + last..offset + end);
        }
        last = end;
    }
    if last < slice.len() {
        pieces.push(offset + last..offset + slice.len());
    }
    pieces
}

fn push_trimmed(text: &str, window: &VecDeque<(Range<usize>, usize)>, out: &mut Vec<Range<usize>>) {
    let (Some((first, _)), Some((last, _))) = (window.front(), window.back()) else {
        return;
    };

    let raw = &text[first.start..last.end];
    let start = first.start + (raw.len() - raw.trim_start().len());
    let end = first.start + raw.trim_end().len();

    if start < end {
        out.push(start..end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DocumentMetadata, SourceType};

    fn sample_text() -> String {
        let words = [
            "vacation", "policy", "employees", "accrue", "days", "per", "month", "and",
            "requests", "need", "manager", "approval", "in", "advance", "of", "travel",
        ];
        let mut paragraphs = Vec::new();
        for p in 0..6 {
            let sentence: Vec<&str> = (0..45).map(|i| words[(i * 7 + p) % words.len()]).collect();
            paragraphs.push(format!("{}.", sentence.join(" ")));
        }
        paragraphs.join("\n\n")
    }

    #[test]
    fn test_short_text_single_chunk() {
        let splitter = TextSplitter::default();
        let spans = splitter.split_text("  Hello world.\n\nThis is a test.  ");

        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "Hello world.\n\nThis is a test.");
        assert_eq!(spans[0].start, 2);
    }

    #[test]
    fn test_empty_and_blank_text() {
        let splitter = TextSplitter::default();
        assert!(splitter.split_text("").is_empty());
        assert!(splitter.split_text(" \n\n \n").is_empty());
    }

    #[test]
    fn test_chunks_respect_size_and_overlap() {
        let text = sample_text();
        let splitter = TextSplitter::new(120, 30).unwrap();
        let spans = splitter.split_text(&text);

        assert!(spans.len() > 3);
        for span in &spans {
            assert!(span.text.chars().count() <= 120, "chunk too long: {:?}", span.text);
            assert_eq!(&text[span.start..span.end], span.text);
        }

        let mut overlapping = 0;
        for pair in spans.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            assert!(next.start > prev.start);
            if next.start < prev.end {
                assert!(prev.end - next.start <= 30);
                overlapping += 1;
            }
        }
        assert!(overlapping > 0);
    }

    #[test]
    fn test_word_level_windows_overlap() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu nu xi omicron pi rho sigma tau upsilon";
        let splitter = TextSplitter::new(30, 10).unwrap();
        let spans = splitter.split_text(text);

        assert!(spans.len() > 1);
        for pair in spans.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            assert!(next.start < prev.end, "{prev:?} / {next:?}");
            assert!(prev.end - next.start <= 10);
        }
    }

    #[test]
    fn test_no_overlap_across_oversized_piece() {
        let text = "intro line here\nalpha beta gamma delta epsilon zeta eta theta iota";
        let splitter = TextSplitter::new(30, 10).unwrap();
        let spans = splitter.split_text(text);

        assert!(spans.len() > 2);
        assert!(spans[0].text.starts_with("intro"));
        assert!(!spans[0].text.contains("alpha"));
        assert!(spans[1].start >= spans[0].end, "{:?} / {:?}", spans[0], spans[1]);

        for pair in spans[1..].windows(2) {
            assert!(pair[1].start < pair[0].end, "{:?} / {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let first = "First paragraph talks about onboarding.";
        let second = "Second paragraph covers expenses.";
        let text = format!("{first}\n\n{second}");
        let splitter = TextSplitter::new(45, 5).unwrap();

        let texts: Vec<String> = splitter.split_text(&text).into_iter().map(|s| s.text).collect();
        assert_eq!(texts, vec![first.to_string(), second.to_string()]);
    }

    #[test]
    fn test_hard_cut_without_boundaries() {
        let text = "abcdefghijklmnopqrstuvwxy";
        let splitter = TextSplitter::new(10, 2).unwrap();
        let spans = splitter.split_text(text);

        let starts: Vec<usize> = spans.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![0, 8, 16]);
        assert!(spans.iter().all(|s| s.text.len() <= 10));
        assert_eq!(spans.last().unwrap().end, text.len());
    }

    #[test]
    fn test_multibyte_text() {
        let text = "été ".repeat(40);
        let splitter = TextSplitter::new(20, 4).unwrap();
        let spans = splitter.split_text(&text);

        assert!(!spans.is_empty());
        assert!(spans.iter().all(|s| s.text.chars().count() <= 20));
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            TextSplitter::new(0, 0),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            TextSplitter::new(100, 100),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_split_documents_inherits_metadata() {
        let text = sample_text();
        let doc = Document::new(
            text.clone(),
            DocumentMetadata::new("handbook.pdf", SourceType::Pdf).with_page(3),
        );
        let splitter = TextSplitter::new(200, 40).unwrap();
        let chunks = splitter.split_documents(std::slice::from_ref(&doc));

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.document_id, doc.id);
            assert_eq!(chunk.chunk_index, i);
            assert_eq!(chunk.metadata.source, "handbook.pdf");
            assert_eq!(chunk.metadata.page, Some(3));
            let start = chunk.metadata.start_offset;
            assert_eq!(&text[start..start + chunk.content.len()], chunk.content);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = sample_text();
        let splitter = TextSplitter::new(150, 25).unwrap();
        assert_eq!(splitter.split_text(&text), splitter.split_text(&text));
    }
}
