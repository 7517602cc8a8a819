//! Boundary-aware text chunking.
//!
//! Text is cut into windows of at most `max_size` characters. When more text
//! follows a window, the window is pulled back to the rightmost sentence
//! terminator, newline, or space, provided that boundary lies past the
//! window's midpoint. Consecutive windows share `overlap` characters.

use serde::{Deserialize, Serialize};

use crate::error::{RetrievalError, Result};

const BOUNDARY_CHARS: [char; 3] = ['.', '\n', ' '];

/// A segment of a source document, tagged with its position among siblings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub source_id: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub origin_path: String,
}

/// Raw input to ingestion: one discovered file.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub text: String,
    pub source_id: String,
    pub origin_path: String,
}

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    max_size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(max_size: usize, overlap: usize) -> Result<Self> {
        if max_size == 0 || overlap >= max_size {
            return Err(RetrievalError::InvalidChunking { max_size, overlap });
        }
        Ok(Self { max_size, overlap })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        split_text(text, self.max_size, self.overlap)
    }

    pub fn chunk_document(&self, document: &SourceDocument) -> Vec<Chunk> {
        let pieces = self.split(&document.text);
        let total_chunks = pieces.len();
        pieces
            .into_iter()
            .enumerate()
            .map(|(chunk_index, content)| Chunk {
                content,
                source_id: document.source_id.clone(),
                chunk_index,
                total_chunks,
                origin_path: document.origin_path.clone(),
            })
            .collect()
    }
}

/// Splits `text` into trimmed, non-empty, overlapping windows.
///
/// Sizes count chars, not bytes. Callers must guarantee
/// `0 < max_size` and `overlap < max_size`; [`Chunker::new`] enforces this.
pub fn split_text(text: &str, max_size: usize, overlap: usize) -> Vec<String> {
    split_spans(text, max_size, overlap)
        .into_iter()
        .map(|(content, _, _)| content)
        .collect()
}

/// Like [`split_text`], also returning each chunk's `[start, end)` char
/// offsets in `text` after trimming.
pub fn split_spans(text: &str, max_size: usize, overlap: usize) -> Vec<(String, usize, usize)> {
    let chars: Vec<char> = text.chars().collect();
    let text_len = chars.len();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text_len {
        let mut end = (start + max_size).min(text_len);

        if end < text_len {
            let window = &chars[start..end];
            if let Some(break_point) = window.iter().rposition(|c| BOUNDARY_CHARS.contains(c)) {
                if break_point as f64 > max_size as f64 * 0.5 {
                    end = start + break_point + 1;
                }
            }
        }

        let window = &chars[start..end];
        if let Some(first) = window.iter().position(|c| !c.is_whitespace()) {
            // `first` exists, so `last` does too.
            let last = window.iter().rposition(|c| !c.is_whitespace()).unwrap_or(first);
            let piece: String = window[first..=last].iter().collect();
            chunks.push((piece, start + first, start + last + 1));
        }

        if end == text_len {
            break;
        }

        // A truncated window can be shorter than the overlap; never move backwards.
        let next = end - overlap.min(end);
        start = if next > start { next } else { end };
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_at_sentence_boundaries() {
        let chunks = split_text("Sentence one. Sentence two. Sentence three.", 20, 5);
        assert_eq!(
            chunks,
            vec!["Sentence one.", "one. Sentence two.", "two. Sentence three."]
        );
        assert!(chunks.iter().all(|c| c.chars().count() <= 20));
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(split_text("", 10, 2).is_empty());
        assert!(split_text("   \n\t ", 10, 2).is_empty());
    }

    #[test]
    fn short_text_yields_one_trimmed_chunk() {
        assert_eq!(split_text("  hello world \n", 20, 5), vec!["hello world"]);
        // Shorter than max_size but longer than max_size - overlap.
        assert_eq!(split_text("abcdefghijklmnopq", 20, 5), vec!["abcdefghijklmnopq"]);
    }

    #[test]
    fn no_boundary_cuts_at_full_width() {
        let chunks = split_text("abcdefghijklmnopqrstuvwxyz", 10, 2);
        assert_eq!(chunks, vec!["abcdefghij", "ijklmnopqr", "qrstuvwxyz"]);
    }

    #[test]
    fn boundary_before_midpoint_is_ignored() {
        // The only space sits at index 2, well before the midpoint of 10.
        let chunks = split_text("ab cdefghijklmnopqrstuvwxyz", 10, 0);
        assert_eq!(chunks[0], "ab cdefghi");
    }

    #[test]
    fn newline_counts_as_boundary() {
        let chunks = split_text("first line\nsecond line here", 14, 0);
        assert_eq!(chunks[0], "first line");
    }

    #[test]
    fn multibyte_text_is_split_on_chars() {
        let text = "αβγδεζηθικλμνξοπρστυφχψω";
        let chunks = split_text(text, 10, 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks[0], "αβγδεζηθικ");
        assert!(chunks.last().unwrap().ends_with('ω'));
    }

    #[test]
    fn large_overlap_still_terminates() {
        let text = "aaaaaaaaaaaa. bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
        let chunks = split_text(text, 20, 19);
        assert!(!chunks.is_empty());
        assert!(chunks.last().unwrap().ends_with('b'));
    }

    /// Text whose non-whitespace characters are all distinct, so every chunk
    /// has exactly one possible position.
    fn distinct_char_text(separators: &[&str]) -> String {
        let glyphs: Vec<char> = ('A'..='Z').chain('a'..='z').chain('α'..='ω').collect();
        let mut text = String::new();
        for (i, word) in glyphs.chunks(3).enumerate() {
            text.extend(word);
            text.push_str(separators[i % separators.len()]);
        }
        text
    }

    #[test]
    fn every_non_whitespace_position_is_covered() {
        let text = distinct_char_text(&[" ", "\n", "  ", " \n "]);
        let chars: Vec<char> = text.chars().collect();

        for (max_size, overlap) in [(1, 0), (7, 0), (7, 3), (16, 4), (25, 10), (50, 49)] {
            let mut covered = vec![false; chars.len()];
            let mut previous = 0;
            for chunk in split_text(&text, max_size, overlap) {
                let first = chunk.chars().next().unwrap();
                let position = chars.iter().position(|&c| c == first).unwrap();
                let len = chunk.chars().count();
                assert!(position >= previous, "chunk {chunk:?} moved backwards");
                assert_eq!(chars[position..position + len].iter().collect::<String>(), chunk);
                covered[position..position + len].iter_mut().for_each(|c| *c = true);
                previous = position;
            }
            for (i, c) in chars.iter().enumerate() {
                assert!(
                    c.is_whitespace() || covered[i],
                    "dropped {c:?} at {i} with ({max_size}, {overlap})"
                );
            }
        }
    }

    #[test]
    fn spans_match_their_content() {
        let text = "  Sentence one. Sentence two.\n\nSentence three.  ";
        let chars: Vec<char> = text.chars().collect();
        let spans = split_spans(text, 20, 5);
        assert_eq!(spans.len(), split_text(text, 20, 5).len());
        let mut previous = 0;
        for (content, start, end) in spans {
            assert!(start >= previous);
            assert_eq!(chars[start..end].iter().collect::<String>(), content);
            previous = start;
        }
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = "One. Two three four. Five six seven eight nine. Ten.";
        assert_eq!(split_text(text, 12, 3), split_text(text, 12, 3));
    }

    #[test]
    fn chunk_document_numbers_chunks() {
        let chunker = Chunker::new(20, 5).unwrap();
        let document = SourceDocument {
            text: "Sentence one. Sentence two. Sentence three.".to_string(),
            source_id: "notes.txt".to_string(),
            origin_path: "/docs/notes.txt".to_string(),
        };
        let chunks = chunker.chunk_document(&document);
        assert_eq!(chunks.len(), 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
            assert_eq!(chunk.total_chunks, 3);
            assert_eq!(chunk.source_id, "notes.txt");
            assert_eq!(chunk.origin_path, "/docs/notes.txt");
        }
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(matches!(
            Chunker::new(0, 0),
            Err(RetrievalError::InvalidChunking { .. })
        ));
        assert!(matches!(
            Chunker::new(10, 10),
            Err(RetrievalError::InvalidChunking { max_size: 10, overlap: 10 })
        ));
        assert!(Chunker::new(10, 9).is_ok());
    }
}
