use std::ops::Range;

use crate::document::Document;
use crate::error::{EditError, Warning};

/// The located extent of one declared object.
///
/// Lines are zero-based and half-open:
///
/// ```text
/// header_line   measure 'X' =          <- kept verbatim
/// body            1 + 1                <- replaced
/// gap           (blank lines)          <- kept
/// properties    formatString: 0        <- kept verbatim
/// end           next declaration / dedent / end of document
/// ```
///
/// A span is only valid against the exact document snapshot it was
/// located in; [`ObjectSpan::validate`] rejects anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSpan {
    pub keyword: String,
    pub name: String,
    pub declared_depth: usize,
    pub header_line: usize,
    /// Exact text of the declaration line, without its terminator.
    pub header: String,
    pub body: Range<usize>,
    pub properties: Range<usize>,
    /// Other declarations with the same keyword and name.
    pub shadowed: Vec<usize>,
    pub(crate) snapshot: String,
}

impl ObjectSpan {
    pub fn start(&self) -> usize {
        self.header_line
    }

    pub fn end(&self) -> usize {
        self.properties.end
    }

    pub fn lines(&self) -> Range<usize> {
        self.start()..self.end()
    }

    pub fn body_depth(&self) -> usize {
        self.declared_depth + 1
    }

    /// Blank lines between the body and the trailing properties (or the span end).
    pub fn gap(&self) -> Range<usize> {
        self.body.end..self.properties.start
    }

    pub fn warnings(&self) -> Vec<Warning> {
        if self.shadowed.is_empty() {
            return Vec::new();
        }
        vec![Warning::AmbiguousName {
            keyword: self.keyword.clone(),
            name: self.name.clone(),
            used: self.header_line,
            shadowed: self.shadowed.clone(),
        }]
    }

    /// Check that this span still describes `document`.
    pub fn validate(&self, document: &Document) -> Result<(), EditError> {
        let stale = || EditError::StaleSpan {
            name: self.name.clone(),
            line: self.header_line,
        };

        if self.end() > document.line_count() || self.header_line >= self.end() {
            return Err(stale());
        }
        if document.line(self.header_line) != self.header {
            return Err(stale());
        }
        if document.slice(self.lines()) != self.snapshot {
            return Err(stale());
        }
        Ok(())
    }
}
