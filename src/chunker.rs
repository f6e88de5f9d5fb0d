//! Text chunking for document ingestion.
//!
//! Documents are split into bounded, overlapping segments before embedding.
//! The splitter prefers to cut at natural boundaries, cascading from
//! paragraph breaks down to single characters when nothing better fits
//! inside the size budget.

use thiserror::Error;

/// Boundary candidates, tried in order. A hard character cut is the
/// implicit last resort.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },
}

/// Splits text into chunks of at most `chunk_size` characters, with
/// consecutive chunks sharing `chunk_overlap` characters.
///
/// Sizes are measured in characters, not bytes; every cut lands on a
/// UTF-8 character boundary. Each call to [`TextSplitter::split`] returns
/// a fresh lazy iterator over slices of the input, so the same splitter
/// can be reused across documents.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ChunkError> {
        if chunk_size == 0 {
            return Err(ChunkError::ZeroChunkSize);
        }
        if chunk_overlap >= chunk_size {
            return Err(ChunkError::OverlapTooLarge {
                size: chunk_size,
                overlap: chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into chunks. Empty input yields an empty iterator.
    pub fn split<'a>(&self, text: &'a str) -> Chunks<'a> {
        Chunks {
            text,
            start: 0,
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }
}

/// Lazy iterator over the chunks of one document.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    start: usize,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl<'a> Chunks<'a> {
    /// Pick a cut inside the current window, preferring the rightmost
    /// occurrence of the strongest separator. A cut is only usable when
    /// the next chunk would still start past the current one.
    fn cut_point(&self, window: &str) -> Option<usize> {
        for sep in SEPARATORS {
            if let Some(idx) = window.rfind(sep) {
                let cut = idx + sep.len();
                if back_up(window, cut, self.chunk_overlap) > 0 {
                    return Some(cut);
                }
            }
        }
        None
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.start >= self.text.len() {
            return None;
        }
        let rest = &self.text[self.start..];
        let window_len = match byte_len_of_chars(rest, self.chunk_size) {
            Some(len) => len,
            None => {
                // Everything left fits into one final chunk.
                self.start = self.text.len();
                return Some(rest);
            }
        };
        let window = &rest[..window_len];
        let cut = self.cut_point(window).unwrap_or(window_len);
        // The next chunk re-reads the trailing `chunk_overlap` characters.
        // overlap < size guarantees this always advances.
        self.start += back_up(rest, cut, self.chunk_overlap);
        Some(&rest[..cut])
    }
}

/// Byte length of the first `chars` characters of `s`, or `None` when `s`
/// has no more than `chars` characters.
fn byte_len_of_chars(s: &str, chars: usize) -> Option<usize> {
    s.char_indices().nth(chars).map(|(idx, _)| idx)
}

/// Byte offset `chars` characters before byte offset `end` in `s`,
/// saturating at the start of the string.
fn back_up(s: &str, end: usize, chars: usize) -> usize {
    if chars == 0 {
        return end;
    }
    s[..end]
        .char_indices()
        .rev()
        .nth(chars - 1)
        .map_or(0, |(idx, _)| idx)
}
