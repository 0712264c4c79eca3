//! Best-effort format checks for TMDL documents.
//!
//! These are heuristics over the line tokenizer, not a grammar: they flag
//! indentation and placement patterns that commonly break loading, and they
//! can be wrong on unusual input. Issues never block an edit.

mod rules;

use std::fmt;

use codespan_reporting::diagnostic::{Diagnostic, Label};
use serde::Serialize;

use crate::document::Document;
use crate::parser::lexer::{LineToken, Tokenizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    fn to_codespan(self) -> codespan_reporting::diagnostic::Severity {
        match self {
            Severity::Error => codespan_reporting::diagnostic::Severity::Error,
            Severity::Warning => codespan_reporting::diagnostic::Severity::Warning,
            Severity::Info => codespan_reporting::diagnostic::Severity::Note,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        };
        f.write_str(label)
    }
}

/// A single lint finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    /// One-based line number.
    pub line: usize,
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    pub line_content: String,
}

impl Issue {
    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self, file_id: usize, document: &Document) -> Diagnostic<usize> {
        let mut diagnostic = Diagnostic::new(self.severity.to_codespan())
            .with_code(self.code)
            .with_message(&self.message);
        if let Some(line) = document.line_ranges().get(self.line - 1) {
            diagnostic = diagnostic.with_labels(vec![Label::primary(file_id, line.content.clone())]);
        }
        diagnostic
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Line {} [{}] {}: {}\n  > {}",
            self.line,
            self.severity,
            self.code,
            self.message,
            self.line_content.trim_end()
        )
    }
}

#[derive(Debug, Clone)]
pub struct LintOptions {
    /// Flag tabs mixed with spaces at structural depth (TMDL011).
    pub mixed_indentation: bool,
    /// Extra keywords treated as properties.
    pub extra_property_keywords: Vec<String>,
}

impl Default for LintOptions {
    fn default() -> Self {
        LintOptions {
            mixed_indentation: true,
            extra_property_keywords: Vec::new(),
        }
    }
}

/// Run every check and return issues ordered by line, then code.
pub fn lint(document: &Document, options: &LintOptions) -> Vec<Issue> {
    let tokenizer =
        Tokenizer::default().with_property_keywords(options.extra_property_keywords.clone());
    let tokens = tokenizer.tokenize(document);
    let cx = LintContext {
        document,
        tokens: &tokens,
    };

    let mut issues = Vec::new();
    rules::property_group_depth(&cx, &mut issues);
    rules::expression_blocks(&cx, &mut issues);
    rules::partition_source_blocks(&cx, &mut issues);
    rules::calculated_partition_source(&cx, &mut issues);
    rules::inline_table_constructor(&cx, &mut issues);
    if options.mixed_indentation {
        rules::mixed_indentation(&cx, &mut issues);
    }

    issues.sort_by(|a, b| (a.line, a.code).cmp(&(b.line, b.code)));
    issues.dedup_by(|a, b| a.line == b.line && a.code == b.code);
    issues
}

pub fn error_count(issues: &[Issue]) -> usize {
    issues.iter().filter(|i| i.severity == Severity::Error).count()
}

pub fn has_errors(issues: &[Issue]) -> bool {
    error_count(issues) > 0
}

struct LintContext<'a> {
    document: &'a Document,
    tokens: &'a [LineToken],
}

impl LintContext<'_> {
    fn issue(&self, index: usize, severity: Severity, code: &'static str, message: String) -> Issue {
        Issue {
            line: index + 1,
            severity,
            code,
            message,
            line_content: self.document.line(index).to_string(),
        }
    }

    fn uses_tabs(&self) -> bool {
        self.document.indent_unit() == crate::document::IndentUnit::Tab
    }
}
