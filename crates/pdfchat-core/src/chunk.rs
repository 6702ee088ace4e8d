//! Sliding-window text chunker with overlap.
//!
//! Splits a document's page texts into [`Chunk`]s of at most `chunk_size`
//! characters. Consecutive chunks share exactly `chunk_overlap` characters,
//! so context that straddles a boundary is present in both chunks.
//!
//! # Algorithm
//!
//! 1. Normalize each page (strip trailing whitespace per line, collapse runs
//!    of blank lines) and join non-empty pages with `\n\n`.
//! 2. Open a window of `chunk_size` characters at the current start.
//! 3. If the window does not reach the end of the text, pull its end back to
//!    the last natural breakpoint in the back half of the window, in order of
//!    preference: paragraph, line, sentence end, word. With no breakpoint the
//!    window is cut at exactly `chunk_size` characters.
//! 4. The next window starts `chunk_overlap` characters before the previous
//!    window's end.
//!
//! Lengths are counted in Unicode scalar values, never bytes, so multi-byte
//! text cannot be split inside a character.
//!
//! # Example
//!
//! ```rust
//! use pdfchat_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("notes.pdf", "The capital of France is Paris.", 1500, 100);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].chunk_index, 0);
//! ```

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Chunk, Page};

/// Breakpoints tried when pulling a window end back, most preferred first.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "? ", "! ", " "];

/// Split the pages of one document into overlapping chunks.
///
/// Empty pages are skipped. Each chunk records the page its first character
/// came from. Returns an empty vector when the document has no text.
pub fn chunk_pages(pages: &[Page], chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    let document = match pages.first() {
        Some(p) => p.document.as_str(),
        None => return Vec::new(),
    };

    let mut joined = String::new();
    // (char offset in `joined`, page index)
    let mut page_starts: Vec<(usize, usize)> = Vec::new();
    let mut offset = 0usize;

    for page in pages {
        let text = normalize(&page.text);
        if text.is_empty() {
            continue;
        }
        if !joined.is_empty() {
            joined.push_str("\n\n");
            offset += 2;
        }
        page_starts.push((offset, page.index));
        offset += text.chars().count();
        joined.push_str(&text);
    }

    let chars: Vec<char> = joined.chars().collect();
    let mut chunks = Vec::new();
    let mut chunk_index: i64 = 0;

    for (start, end) in window_spans(&chars, chunk_size, chunk_overlap) {
        let text: String = chars[start..end].iter().collect();
        if text.trim().is_empty() {
            continue;
        }
        let page = page_starts
            .iter()
            .take_while(|(page_offset, _)| *page_offset <= start)
            .last()
            .map(|(_, index)| *index)
            .unwrap_or(0);
        chunks.push(make_chunk(document, chunk_index, page, text));
        chunk_index += 1;
    }

    chunks
}

/// Chunk a single block of text as if it were one page.
pub fn chunk_text(document: &str, text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    let page = Page {
        document: document.to_string(),
        index: 0,
        text: text.to_string(),
    };
    chunk_pages(std::slice::from_ref(&page), chunk_size, chunk_overlap)
}

/// Compute `[start, end)` character spans of each window.
///
/// `chunk_overlap` is clamped below `chunk_size` so the window always
/// advances.
pub fn window_spans(chars: &[char], chunk_size: usize, chunk_overlap: usize) -> Vec<(usize, usize)> {
    let len = chars.len();
    if len == 0 || chunk_size == 0 {
        return Vec::new();
    }
    let overlap = chunk_overlap.min(chunk_size - 1);

    let mut spans = Vec::new();
    let mut start = 0usize;
    loop {
        let hard_end = (start + chunk_size).min(len);
        if hard_end == len {
            spans.push((start, len));
            break;
        }
        // Breakpoints must leave the window longer than the overlap.
        let floor = start + (chunk_size / 2).max(overlap + 1);
        let end = find_breakpoint(chars, floor, hard_end).unwrap_or(hard_end);
        spans.push((start, end));
        start = end - overlap;
    }
    spans
}

/// Last position `p` in `[floor, hard_end]` directly after a separator.
fn find_breakpoint(chars: &[char], floor: usize, hard_end: usize) -> Option<usize> {
    for sep in SEPARATORS {
        let sep: Vec<char> = sep.chars().collect();
        let found = (floor..=hard_end)
            .rev()
            .find(|&p| p >= sep.len() && chars[p - sep.len()..p] == sep[..]);
        if found.is_some() {
            return found;
        }
    }
    None
}

/// Trim line ends and collapse runs of blank lines to a single blank line.
fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0usize;
    for line in text.trim().lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
    }
    out
}

/// Build a [`Chunk`] with a deterministic id and SHA-256 content hash.
fn make_chunk(document: &str, index: i64, page: usize, text: String) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    let key = format!("{}\u{1f}{}\u{1f}{}", document, index, hash);
    let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string();

    Chunk {
        id,
        document: document.to_string(),
        page,
        chunk_index: index,
        text,
        hash,
    }
}
