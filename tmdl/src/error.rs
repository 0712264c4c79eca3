use std::path::PathBuf;

use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};
use thiserror::Error;

use crate::document::Document;

/// Failures of locate / replace / file edit operations.
///
/// Nothing is written to disk when one of these is returned.
#[derive(Error, Debug)]
pub enum EditError {
    /// No declaration with this keyword and name.
    #[error("{keyword} '{name}' not found")]
    ObjectNotFound { keyword: String, name: String },

    /// The table used to scope a lookup does not exist.
    #[error("table '{name}' not found")]
    TableNotFound { name: String },

    /// An object with this keyword and name is already declared where a
    /// new one would be added.
    #[error("{keyword} '{name}' already exists")]
    DuplicateObject { keyword: String, name: String },

    /// A span no longer matches the document it is applied to.
    #[error("stale span for '{name}': line {} no longer matches the located object", .line + 1)]
    StaleSpan { name: String, line: usize },

    /// The declaration line matched but cannot be split into header and body.
    #[error("malformed header for {keyword} '{name}' on line {}: {reason}", .line + 1)]
    MalformedHeader {
        keyword: String,
        name: String,
        line: usize,
        reason: String,
    },

    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EditError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EditError::Io {
            path: path.into(),
            source,
        }
    }

    /// Short name of the failure kind, for user-facing reports.
    pub fn kind(&self) -> &'static str {
        match self {
            EditError::ObjectNotFound { .. } => "ObjectNotFound",
            EditError::TableNotFound { .. } => "TableNotFound",
            EditError::DuplicateObject { .. } => "DuplicateObject",
            EditError::StaleSpan { .. } => "StaleSpan",
            EditError::MalformedHeader { .. } => "MalformedHeader",
            EditError::Io { .. } => "Io",
        }
    }

    /// Zero-based source line the error points at, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            EditError::StaleSpan { line, .. } | EditError::MalformedHeader { line, .. } => {
                Some(*line)
            }
            _ => None,
        }
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self, file_id: usize, document: &Document) -> Diagnostic<usize> {
        let diagnostic = Diagnostic::error()
            .with_code(self.kind())
            .with_message(self.to_string());

        match self.line() {
            Some(line) if line < document.line_count() => {
                let span = document.line_ranges()[line].content.clone();
                diagnostic.with_labels(vec![Label::primary(file_id, span)])
            }
            _ => diagnostic,
        }
    }
}

/// Non-fatal findings reported alongside a successful locate or edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Other declarations share the edited object's keyword and name; the
    /// first one with a body block was used.
    AmbiguousName {
        keyword: String,
        name: String,
        used: usize,
        shadowed: Vec<usize>,
    },
}

impl Warning {
    pub fn message(&self) -> String {
        match self {
            Warning::AmbiguousName {
                keyword,
                name,
                used,
                shadowed,
            } => {
                let others: Vec<String> = shadowed.iter().map(|l| (l + 1).to_string()).collect();
                format!(
                    "{} '{}' is declared more than once; using line {} (also on line {})",
                    keyword,
                    name,
                    used + 1,
                    others.join(", ")
                )
            }
        }
    }

    pub fn to_diagnostic(&self, file_id: usize, document: &Document) -> Diagnostic<usize> {
        let Warning::AmbiguousName { used, shadowed, .. } = self;
        let ranges = document.line_ranges();
        let mut labels = Vec::new();
        if let Some(line) = ranges.get(*used) {
            labels.push(Label::primary(file_id, line.content.clone()).with_message("edited"));
        }
        for index in shadowed {
            if let Some(line) = ranges.get(*index) {
                labels.push(
                    Label::secondary(file_id, line.content.clone()).with_message("also declared here"),
                );
            }
        }
        Diagnostic::new(Severity::Warning)
            .with_message(self.message())
            .with_labels(labels)
            .with_notes(vec![
                "scope the lookup to a table to pick a different declaration".to_string(),
            ])
    }
}
