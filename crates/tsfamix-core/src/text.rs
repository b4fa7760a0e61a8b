//! Text position utilities for byte offset and line:column conversions.
//!
//! ## Coordinate Conventions
//!
//! - Lines and columns are **1-indexed** (matching editor conventions)
//! - Byte offsets are **0-indexed**
//! - Columns count Unicode scalar values, not bytes

use crate::anchor::Span;

/// Precomputed index of line start offsets for fast offset-to-line-col conversion.
///
/// Build once per file with O(n), then each lookup is O(log n) via binary search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    /// Byte offsets where each line begins.
    /// line_starts[0] = 0 (line 1), line_starts[1] = first newline + 1 (line 2), etc.
    line_starts: Vec<u32>,
    /// Text copy used for char-aware column computation.
    text: String,
}

impl LineIndex {
    /// Build a line index from file content. O(n) where n is content length.
    pub fn new(content: &str) -> Self {
        let mut line_starts = vec![0];
        for (offset, ch) in content.char_indices() {
            if ch == '\n' {
                line_starts.push(offset as u32 + 1);
            }
        }
        LineIndex {
            line_starts,
            text: content.to_string(),
        }
    }

    /// Convert a byte offset to (line, col), both 1-indexed.
    ///
    /// Offsets past the end of the content clamp to the last position.
    pub fn line_col(&self, byte_offset: u32) -> (u32, u32) {
        let byte_offset = byte_offset.min(self.text.len() as u32);
        let line_idx = match self.line_starts.binary_search(&byte_offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let line_start = self.line_starts[line_idx] as usize;
        let end = (byte_offset as usize).max(line_start);
        let col = match self.text.get(line_start..end) {
            Some(prefix) => prefix.chars().count() as u32 + 1,
            None => (end - line_start) as u32 + 1,
        };
        (line_idx as u32 + 1, col)
    }

    /// Number of lines in the content.
    pub fn line_count(&self) -> u32 {
        self.line_starts.len() as u32
    }

    /// Get the `(start_line, end_line)` range spanned by a byte span.
    pub fn line_range(&self, span: Span) -> (u32, u32) {
        let (start, _) = self.line_col(span.start);
        let (end, _) = self.line_col(span.end.saturating_sub(1).max(span.start));
        (start, end)
    }
}

impl Default for LineIndex {
    fn default() -> Self {
        LineIndex::new("")
    }
}

/// Extract the text covered by a span, if the span is in bounds.
pub fn slice(content: &str, span: Span) -> Option<&str> {
    content.get(span.start as usize..span.end as usize)
}

/// Collapse runs of whitespace into single spaces and trim the ends.
///
/// Used for signature text so that line breaks inside a declaration head
/// do not leak into entity attributes.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
