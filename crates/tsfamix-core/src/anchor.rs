//! Source anchors: where an entity originates in the project.
//!
//! Syntax nodes carry 0-based, half-open byte [`Span`]s. Entities carry a
//! [`SourceAnchor`], which is what downstream tooling sees:
//!
//! - `file`: project-relative path (always forward slashes)
//! - `start` / `end`: **1-based, inclusive** character offsets
//! - `start_line` / `end_line`: optional 1-based line numbers
//!
//! A span `[s, e)` becomes the anchor range `s + 1 ..= e`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::text::LineIndex;

/// Byte offsets into file content.
///
/// Spans are half-open intervals: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: u32,
    /// End byte offset (exclusive).
    pub end: u32,
}

impl Span {
    /// Create a new span.
    ///
    /// # Panics
    /// Panics if `start > end`.
    pub fn new(start: u32, end: u32) -> Self {
        assert!(
            start <= end,
            "Span start ({}) must be <= end ({})",
            start,
            end
        );
        Span { start, end }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Check if span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Check if this span contains another span entirely.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Location of an entity in the indexed project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceAnchor {
    /// Project-relative file path.
    pub file: String,
    /// 1-based start offset (inclusive).
    pub start: u32,
    /// 1-based end offset (inclusive).
    pub end: u32,
    /// 1-based start line, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    /// 1-based end line, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
}

impl SourceAnchor {
    /// Anchor a 0-based span without line information.
    pub fn from_span(file: impl Into<String>, span: Span) -> Self {
        SourceAnchor {
            file: file.into(),
            start: span.start + 1,
            end: span.end,
            start_line: None,
            end_line: None,
        }
    }

    /// Anchor a 0-based span, filling in line numbers from a line index.
    pub fn with_lines(file: impl Into<String>, span: Span, lines: &LineIndex) -> Self {
        let (start_line, _) = lines.line_col(span.start);
        let (end_line, _) = lines.line_col(span.end.saturating_sub(1).max(span.start));
        SourceAnchor {
            start_line: Some(start_line),
            end_line: Some(end_line),
            ..SourceAnchor::from_span(file, span)
        }
    }

    /// Number of source lines covered, when line information is present.
    pub fn line_count(&self) -> Option<u32> {
        match (self.start_line, self.end_line) {
            (Some(start), Some(end)) => Some(end.saturating_sub(start) + 1),
            _ => None,
        }
    }
}

impl fmt::Display for SourceAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.file, self.start, self.end)
    }
}
