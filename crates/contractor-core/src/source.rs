//! Debug source locations.
//!
//! The decompiler attaches a [`SourceSpan`] to statements when debug
//! information is available. Recovering the original text behind a span goes
//! through the [`SourceProvider`] trait; [`SourceMap`] is the in-memory
//! implementation used by hosts that have the documents at hand.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A region of a source document.
///
/// Lines and columns are 1-based; `end_column` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    pub document: String,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl SourceSpan {
    pub fn new(
        document: impl Into<String>,
        start_line: u32,
        start_column: u32,
        end_line: u32,
        end_column: u32,
    ) -> Self {
        SourceSpan {
            document: document.into(),
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({},{})-({},{})",
            self.document, self.start_line, self.start_column, self.end_line, self.end_column
        )
    }
}

/// Maps debug locations back to source text.
pub trait SourceProvider {
    /// Returns the text covered by `span`, or `None` when the document is
    /// unknown or the span falls outside it.
    fn span_text(&self, span: &SourceSpan) -> Option<String>;
}

/// In-memory source documents keyed by document path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceMap {
    documents: HashMap<String, Vec<String>>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a document.
    pub fn add_document(&mut self, path: impl Into<String>, text: &str) {
        let lines = text.lines().map(str::to_string).collect();
        self.documents.insert(path.into(), lines);
    }

    pub fn contains(&self, path: &str) -> bool {
        self.documents.contains_key(path)
    }
}

impl SourceProvider for SourceMap {
    fn span_text(&self, span: &SourceSpan) -> Option<String> {
        let lines = self.documents.get(&span.document)?;
        if span.start_line == 0 || span.start_column == 0 || span.end_line < span.start_line {
            return None;
        }
        let first = span.start_line as usize - 1;
        let last = span.end_line as usize - 1;
        if last >= lines.len() {
            return None;
        }

        let mut out = String::new();
        for (offset, line) in lines[first..=last].iter().enumerate() {
            let chars: Vec<char> = line.chars().collect();
            let from = if offset == 0 {
                (span.start_column as usize - 1).min(chars.len())
            } else {
                0
            };
            let to = if first + offset == last {
                (span.end_column as usize).saturating_sub(1).min(chars.len())
            } else {
                chars.len()
            };
            if offset > 0 {
                out.push('\n');
            }
            if from < to {
                out.extend(&chars[from..to]);
            }
        }
        Some(out)
    }
}
