use std::collections::HashSet;

use crate::document::indent::has_mixed_indentation;
use crate::document::{Document, IndentUnit};

/// Keywords that open a named object declaration.
pub const OBJECT_KEYWORDS: &[&str] = &[
    "measure",
    "column",
    "table",
    "partition",
    "relationship",
    "hierarchy",
    "level",
    "calculationItem",
    "expression",
];

/// Property keywords recognized after an object's expression body.
///
/// This is a fixed allow-list, not a grammar: a property spelled with any
/// other keyword is read as expression text.
pub const PROPERTY_KEYWORDS: &[&str] = &[
    "formatString",
    "displayFolder",
    "lineageTag",
    "dataCategory",
    "summarizeBy",
    "isHidden",
    "dataType",
    "sourceColumn",
    "sortByColumn",
    "changedProperty",
    "annotation",
];

/// How the object name was written on the declaration line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quote {
    Single,
    Double,
    Bare,
}

/// What follows the name on a declaration line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// `=` ends the line; the expression follows on deeper lines.
    Open,
    /// `= m`, `= calculated`: a partition source kind.
    Kind(String),
    /// The expression sits on the declaration line itself.
    Inline(String),
    /// No `=` at all (`table Sales`, `column Amount`).
    Absent,
}

/// A parsed declaration line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub keyword: String,
    pub name: String,
    pub quote: Quote,
    pub assignment: Assignment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Blank,
    /// `/// text`: a description of the object declared below it.
    Description,
    Declaration(Header),
    Property(String),
    Other,
}

/// One classified source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineToken {
    /// Zero-based line index.
    pub index: usize,
    pub depth: usize,
    pub kind: LineKind,
    /// Leading whitespace mixes tabs and spaces.
    pub mixed_indent: bool,
}

impl LineToken {
    pub fn is_blank(&self) -> bool {
        matches!(self.kind, LineKind::Blank)
    }

    pub fn header(&self) -> Option<&Header> {
        match &self.kind {
            LineKind::Declaration(header) => Some(header),
            _ => None,
        }
    }

    pub fn is_property(&self) -> bool {
        matches!(self.kind, LineKind::Property(_))
    }
}

/// Classifies document lines into declarations, properties and expression text.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    properties: HashSet<String>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Tokenizer {
            properties: PROPERTY_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend the property allow-list.
    pub fn with_property_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties.extend(keywords.into_iter().map(Into::into));
        self
    }

    pub fn is_property_keyword(&self, word: &str) -> bool {
        self.properties.contains(word)
    }

    pub fn tokenize(&self, document: &Document) -> Vec<LineToken> {
        let unit = document.indent_unit();
        document
            .lines()
            .enumerate()
            .map(|(index, line)| self.classify(index, line, unit))
            .collect()
    }

    fn classify(&self, index: usize, line: &str, unit: IndentUnit) -> LineToken {
        let trimmed = line.trim();
        let kind = if trimmed.is_empty() {
            LineKind::Blank
        } else if trimmed.starts_with("///") {
            LineKind::Description
        } else if let Some(header) = parse_header(trimmed) {
            LineKind::Declaration(header)
        } else if let Some(keyword) = self.property_keyword(trimmed) {
            LineKind::Property(keyword.to_string())
        } else {
            LineKind::Other
        };

        LineToken {
            index,
            depth: unit.depth_of(line),
            kind,
            mixed_indent: has_mixed_indentation(line),
        }
    }

    fn property_keyword<'a>(&self, trimmed: &'a str) -> Option<&'a str> {
        let (word, rest) = split_word(trimmed);
        if word.is_empty() || !self.properties.contains(word) {
            return None;
        }
        match rest.chars().next() {
            None | Some(':') | Some('=') => Some(word),
            Some(c) if c.is_whitespace() => Some(word),
            _ => None,
        }
    }
}

/// Classify every line of `document` with the default property allow-list.
pub fn tokenize(document: &Document) -> Vec<LineToken> {
    Tokenizer::default().tokenize(document)
}

/// Parse a trimmed line as `<keyword> <name> [= ...]`.
pub fn parse_header(trimmed: &str) -> Option<Header> {
    let (keyword, rest) = split_word(trimmed);
    if !OBJECT_KEYWORDS.contains(&keyword) {
        return None;
    }
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let (name, quote, rest) = parse_name(rest.trim_start())?;
    let rest = rest.trim_start();

    let assignment = if rest.is_empty() {
        Assignment::Absent
    } else if let Some(after) = rest.strip_prefix('=') {
        if after.starts_with('=') {
            Assignment::Absent
        } else {
            let after = after.trim();
            if after.is_empty() {
                Assignment::Open
            } else if keyword == "partition" && !after.contains(char::is_whitespace) {
                Assignment::Kind(after.to_string())
            } else {
                Assignment::Inline(after.to_string())
            }
        }
    } else {
        Assignment::Absent
    };

    Some(Header {
        keyword: keyword.to_string(),
        name,
        quote,
        assignment,
    })
}

/// Read a quoted or bare object name. Doubled quotes inside a quoted
/// name are unescaped.
fn parse_name(text: &str) -> Option<(String, Quote, &str)> {
    let mut chars = text.char_indices();
    let (_, first) = chars.next()?;

    let (delim, quote) = match first {
        '\'' => ('\'', Quote::Single),
        '"' => ('"', Quote::Double),
        c if c.is_alphanumeric() || c == '_' => {
            let end = text
                .find(|c: char| c.is_whitespace() || c == '=')
                .unwrap_or(text.len());
            return Some((text[..end].to_string(), Quote::Bare, &text[end..]));
        }
        _ => return None,
    };

    let mut name = String::new();
    let mut iter = text[1..].char_indices().peekable();
    while let Some((i, c)) = iter.next() {
        if c == delim {
            if matches!(iter.peek(), Some((_, next)) if *next == delim) {
                name.push(delim);
                iter.next();
                continue;
            }
            return Some((name, quote, &text[1 + i + c.len_utf8()..]));
        }
        name.push(c);
    }

    // Unterminated quote
    None
}

/// Split off a leading identifier (`[A-Za-z0-9_]`).
fn split_word(text: &str) -> (&str, &str) {
    let end = text
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(text.len());
    text.split_at(end)
}
