pub mod indent;

use std::fmt;
use std::ops::Range;

pub use indent::IndentUnit;

/// Line terminator convention of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    /// `\n`
    Lf,
    /// `\r\n`
    CrLf,
    /// `\r`
    Cr,
}

impl LineEnding {
    pub fn detect(text: &str) -> Self {
        if text.contains("\r\n") {
            LineEnding::CrLf
        } else if text.contains('\r') {
            LineEnding::Cr
        } else {
            LineEnding::Lf
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
            LineEnding::Cr => "\r",
        }
    }
}

/// Byte ranges of one line: its content and its terminator.
/// The terminator range is empty for a final unterminated line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub content: Range<usize>,
    pub terminator: Range<usize>,
}

impl Line {
    /// Content plus terminator.
    pub fn full(&self) -> Range<usize> {
        self.content.start..self.terminator.end
    }
}

/// An immutable TMDL source text with its line table.
///
/// Line endings are kept byte-for-byte; editing produces a new `Document`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    text: String,
    lines: Vec<Line>,
    line_ending: LineEnding,
    indent: IndentUnit,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let lines = split_lines(&text);
        let line_ending = LineEnding::detect(&text);
        let indent = IndentUnit::detect(lines.iter().map(|l| &text[l.content.clone()]));
        Document {
            text,
            lines,
            line_ending,
            indent,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Content of line `index` without its terminator.
    pub fn line(&self, index: usize) -> &str {
        &self.text[self.lines[index].content.clone()]
    }

    /// Terminator of line `index` (empty for a final unterminated line).
    pub fn terminator(&self, index: usize) -> &str {
        &self.text[self.lines[index].terminator.clone()]
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> + '_ {
        self.lines.iter().map(|l| &self.text[l.content.clone()])
    }

    pub fn line_ranges(&self) -> &[Line] {
        &self.lines
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    pub fn indent_unit(&self) -> IndentUnit {
        self.indent
    }

    /// True if the last line carries a terminator.
    pub fn ends_with_terminator(&self) -> bool {
        self.lines
            .last()
            .is_some_and(|l| !l.terminator.is_empty())
    }

    /// Byte offset where line `index` starts. `index == line_count()` maps to the end of text.
    pub fn line_start(&self, index: usize) -> usize {
        self.lines
            .get(index)
            .map(|l| l.content.start)
            .unwrap_or(self.text.len())
    }

    /// Byte range covering the given lines, terminators included.
    pub fn byte_range(&self, lines: Range<usize>) -> Range<usize> {
        self.line_start(lines.start)..self.line_start(lines.end)
    }

    /// Source text of the given lines, terminators included.
    pub fn slice(&self, lines: Range<usize>) -> &str {
        &self.text[self.byte_range(lines)]
    }

    /// Zero-based line index containing byte `offset`.
    pub fn line_of_offset(&self, offset: usize) -> usize {
        match self
            .lines
            .binary_search_by(|l| l.content.start.cmp(&offset))
        {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Split text into lines, recognizing `\n`, `\r\n` and lone `\r`.
fn split_lines(text: &str) -> Vec<Line> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(Line {
                    content: start..i,
                    terminator: i..i + 1,
                });
                i += 1;
                start = i;
            }
            b'\r' => {
                let len = if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                lines.push(Line {
                    content: start..i,
                    terminator: i..i + len,
                });
                i += len;
                start = i;
            }
            _ => i += 1,
        }
    }

    if start < bytes.len() {
        lines.push(Line {
            content: start..bytes.len(),
            terminator: bytes.len()..bytes.len(),
        });
    }

    lines
}
