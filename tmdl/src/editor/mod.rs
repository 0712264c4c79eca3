mod insert;
mod reindent;
mod span;

pub use insert::{NewPartition, PartitionMode, quote_name};
pub use reindent::{Reindent, normalize_body};
pub use span::ObjectSpan;

use std::ops::Range;

use crate::document::Document;
use crate::error::EditError;
use crate::parser::lexer::{Assignment, LineKind, LineToken, Tokenizer};
use crate::parser::parse_outline;

/// Where to look for an object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Scope {
    /// The whole document; the first editable match in document order wins.
    #[default]
    Document,
    /// Only inside the named `table` block.
    Table(String),
}

/// Locates named objects and replaces their bodies.
///
/// The editor never mutates its input: every edit returns a new
/// [`Document`], and failures leave nothing half-applied.
#[derive(Debug, Clone, Default)]
pub struct Editor {
    tokenizer: Tokenizer,
    reindent: Reindent,
}

impl Editor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat additional keywords as trailing properties.
    pub fn with_property_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tokenizer = self.tokenizer.with_property_keywords(keywords);
        self
    }

    pub fn with_reindent(mut self, reindent: Reindent) -> Self {
        self.reindent = reindent;
        self
    }

    pub fn reindent(&self) -> Reindent {
        self.reindent
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Find the first `keyword 'name'` declaration in the document.
    pub fn locate(
        &self,
        document: &Document,
        keyword: &str,
        name: &str,
    ) -> Result<ObjectSpan, EditError> {
        self.locate_in(document, &Scope::Document, keyword, name)
    }

    /// Find the first `keyword 'name'` declaration inside `scope`.
    pub fn locate_in(
        &self,
        document: &Document,
        scope: &Scope,
        keyword: &str,
        name: &str,
    ) -> Result<ObjectSpan, EditError> {
        let tokens = self.tokenizer.tokenize(document);
        let range = scope_range(&tokens, scope)?;
        locate_tokens(document, &tokens, range, keyword, name)
    }

    /// Replace the body of a previously located object.
    pub fn replace_body(
        &self,
        document: &Document,
        span: &ObjectSpan,
        new_body: &str,
    ) -> Result<Document, EditError> {
        span.validate(document)?;

        let eol = match document.terminator(span.header_line) {
            "" => document.line_ending().as_str(),
            t => t,
        };
        let body = normalize_body(
            new_body,
            document.indent_unit(),
            span.body_depth(),
            self.reindent,
        );
        let rest_follows = span.body.end < document.line_count();

        let mut out = String::with_capacity(document.text().len() + new_body.len());
        out.push_str(&document.text()[..document.line_start(span.header_line)]);
        out.push_str(&span.header);

        let header_eol = document.terminator(span.header_line);
        if !header_eol.is_empty() {
            out.push_str(header_eol);
        } else if !body.is_empty() || rest_follows {
            out.push_str(eol);
        }

        for (i, line) in body.iter().enumerate() {
            out.push_str(line);
            let is_last = i + 1 == body.len();
            if !is_last || rest_follows || document.ends_with_terminator() {
                out.push_str(eol);
            }
        }

        out.push_str(document.slice(span.body.end..document.line_count()));
        Ok(Document::new(out))
    }

    /// Locate `keyword 'name'` and replace its body in one step.
    pub fn edit(
        &self,
        document: &Document,
        keyword: &str,
        name: &str,
        new_body: &str,
    ) -> Result<Document, EditError> {
        let span = self.locate(document, keyword, name)?;
        self.replace_body(document, &span, new_body)
    }

    /// Scoped variant of [`Editor::edit`].
    pub fn edit_in(
        &self,
        document: &Document,
        scope: &Scope,
        keyword: &str,
        name: &str,
        new_body: &str,
    ) -> Result<Document, EditError> {
        let span = self.locate_in(document, scope, keyword, name)?;
        self.replace_body(document, &span, new_body)
    }

    /// Current body of an object with one body level of indentation removed.
    pub fn extract(
        &self,
        document: &Document,
        scope: &Scope,
        keyword: &str,
        name: &str,
    ) -> Result<String, EditError> {
        let span = self.locate_in(document, scope, keyword, name)?;
        Ok(body_text(document, &span))
    }
}

/// Body lines of `span` with `body_depth` levels stripped, joined by `\n`.
pub fn body_text(document: &Document, span: &ObjectSpan) -> String {
    let unit = document.indent_unit();
    span.body
        .clone()
        .map(|i| {
            let line = document.line(i);
            if line.trim().is_empty() {
                ""
            } else {
                unit.strip_levels(line, span.body_depth())
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Find the first `keyword 'name'` declaration with the default property list.
pub fn locate(document: &Document, keyword: &str, name: &str) -> Result<ObjectSpan, EditError> {
    Editor::default().locate(document, keyword, name)
}

/// Replace the body of `span` with `new_body`, flattening its indentation.
pub fn replace_body(
    document: &Document,
    span: &ObjectSpan,
    new_body: &str,
) -> Result<Document, EditError> {
    Editor::default().replace_body(document, span, new_body)
}

/// Locate and replace in one call. This is the entry point most callers want.
pub fn edit_named_object(
    document: &Document,
    keyword: &str,
    name: &str,
    new_body: &str,
) -> Result<Document, EditError> {
    Editor::default().edit(document, keyword, name, new_body)
}

/// Current body text of `keyword 'name'`.
pub fn extract_body(document: &Document, keyword: &str, name: &str) -> Result<String, EditError> {
    Editor::default().extract(document, &Scope::Document, keyword, name)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Line range searched for a scope.
fn scope_range(tokens: &[LineToken], scope: &Scope) -> Result<Range<usize>, EditError> {
    match scope {
        Scope::Document => Ok(0..tokens.len()),
        Scope::Table(table) => {
            parse_outline(tokens)
                .find("table", table)
                .map(|node| node.lines.start + 1..node.lines.end)
                .ok_or_else(|| EditError::TableNotFound {
                    name: table.clone(),
                })
        }
    }
}

fn locate_tokens(
    document: &Document,
    tokens: &[LineToken],
    range: Range<usize>,
    keyword: &str,
    name: &str,
) -> Result<ObjectSpan, EditError> {
    let not_found = || EditError::ObjectNotFound {
        keyword: keyword.to_string(),
        name: name.to_string(),
    };

    // Quoted names containing a quote are ambiguous in the grammar.
    if name.contains('\'') {
        return Err(not_found());
    }

    let matches: Vec<&LineToken> = tokens[range.clone()]
        .iter()
        .filter(|t| {
            t.header()
                .is_some_and(|h| h.keyword == keyword && h.name == name)
        })
        .collect();
    // The first declaration with a body block wins; a header without one
    // is only reported when nothing else matches.
    let decl = matches
        .iter()
        .copied()
        .find(|t| {
            t.header().is_some_and(|h| {
                matches!(h.assignment, Assignment::Open | Assignment::Kind(_))
            })
        })
        .or_else(|| matches.first().copied())
        .ok_or_else(not_found)?;
    let shadowed: Vec<usize> = matches
        .iter()
        .map(|t| t.index)
        .filter(|&i| i != decl.index)
        .collect();

    let Some(header) = decl.header() else {
        return Err(not_found());
    };
    let malformed = |reason: &str| EditError::MalformedHeader {
        keyword: keyword.to_string(),
        name: name.to_string(),
        line: decl.index,
        reason: reason.to_string(),
    };
    match &header.assignment {
        Assignment::Open | Assignment::Kind(_) => {}
        Assignment::Absent => return Err(malformed("missing '='")),
        Assignment::Inline(_) => {
            return Err(malformed(
                "expression is on the declaration line; move it to its own lines first",
            ));
        }
    }

    let declared = decl.depth;
    let mut end = range.end;
    let mut properties_start: Option<usize> = None;

    for token in &tokens[decl.index + 1..range.end] {
        if token.is_blank() {
            continue;
        }
        if token.depth < declared {
            end = token.index;
            break;
        }
        if token.depth == declared {
            match token.kind {
                LineKind::Declaration(_) | LineKind::Description => {
                    end = token.index;
                    break;
                }
                LineKind::Property(_) if properties_start.is_none() => {
                    properties_start = Some(token.index);
                }
                _ => {}
            }
        }
    }

    let tail_start = properties_start.unwrap_or(end);
    let body_start = decl.index + 1;
    let body_end = (body_start..tail_start)
        .rev()
        .find(|&i| !tokens[i].is_blank())
        .map_or(body_start, |i| i + 1);

    Ok(ObjectSpan {
        keyword: keyword.to_string(),
        name: name.to_string(),
        declared_depth: declared,
        header_line: decl.index,
        header: document.line(decl.index).to_string(),
        body: body_start..body_end,
        properties: tail_start..end,
        shadowed,
        snapshot: document.slice(decl.index..end).to_string(),
    })
}
