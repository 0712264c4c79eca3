use once_cell::sync::Lazy;
use regex::Regex;

use super::{Issue, LintContext, Severity};
use crate::document::indent::leading_whitespace;
use crate::parser::lexer::{Assignment, LineKind};

static RETURN_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*RETURN\b").unwrap());
static SOURCE_BRACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*source\s*=\s*\{").unwrap());
static EXPRESSION_BRACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"expression\s*:=\s*\{").unwrap());
static CALCULATED_PARTITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*partition\b.*=\s*calculated\s*$").unwrap());
static PARTITION_OR_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(partition|table)\s+").unwrap());

/// How far ahead a property group is followed.
const PROPERTY_GROUP_WINDOW: usize = 4;
/// How far back a `source = {` line looks for its partition.
const PARTITION_LOOKBACK: usize = 9;
/// Mixed indentation deeper than this many tabs is tolerated.
const STRUCTURAL_TAB_DEPTH: usize = 3;

fn is_comment(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("//") || t.starts_with("--")
}

/// TMDL001: consecutive properties at different depths.
pub(super) fn property_group_depth(cx: &LintContext<'_>, issues: &mut Vec<Issue>) {
    let tokens = cx.tokens;
    for (i, token) in tokens.iter().enumerate() {
        if !token.is_property() {
            continue;
        }
        for next in tokens.iter().skip(i + 1).take(PROPERTY_GROUP_WINDOW) {
            if next.is_blank() {
                continue;
            }
            if !next.is_property() {
                break;
            }
            if next.depth != token.depth {
                issues.push(cx.issue(
                    next.index,
                    Severity::Error,
                    "TMDL001",
                    format!(
                        "Inconsistent property indentation. Expected {} levels, got {}",
                        token.depth, next.depth
                    ),
                ));
            }
        }
    }
}

/// TMDL002, TMDL003, TMDL004: lines inside multi-line measure/column expressions.
pub(super) fn expression_blocks(cx: &LintContext<'_>, issues: &mut Vec<Issue>) {
    struct Expr {
        depth: usize,
        return_depth: Option<usize>,
    }

    let mut current: Option<Expr> = None;

    for token in cx.tokens {
        if token.is_blank() {
            continue;
        }
        let line = cx.document.line(token.index);

        if let Some(expr) = &mut current {
            let body_depth = expr.depth + 1;
            match &token.kind {
                LineKind::Declaration(_) | LineKind::Description
                    if token.depth <= expr.depth =>
                {
                    current = None;
                }
                LineKind::Property(keyword) => {
                    if token.depth < expr.depth {
                        issues.push(cx.issue(
                            token.index,
                            Severity::Error,
                            "TMDL002",
                            format!(
                                "Property '{}' is shallower than its declaration. Expected {} levels, got {}",
                                keyword, expr.depth, token.depth
                            ),
                        ));
                        current = None;
                    } else if token.depth == expr.depth {
                        current = None;
                    } else if expr.return_depth.is_some_and(|d| token.depth > d) {
                        issues.push(cx.issue(
                            token.index,
                            Severity::Error,
                            "TMDL004",
                            format!(
                                "Property '{}' appears to be inside the expression block. Properties must follow the expression at the declaration's depth",
                                keyword
                            ),
                        ));
                    }
                    continue;
                }
                _ => {
                    if token.depth < body_depth && !is_comment(line) {
                        issues.push(cx.issue(
                            token.index,
                            Severity::Warning,
                            "TMDL003",
                            format!(
                                "Expression line may have incorrect indentation. Expected at least {} levels, got {}",
                                body_depth, token.depth
                            ),
                        ));
                    }
                    if token.depth < expr.depth {
                        current = None;
                    } else {
                        if RETURN_LINE.is_match(line) {
                            expr.return_depth = Some(token.depth);
                        }
                        continue;
                    }
                }
            }
        }

        if let Some(header) = token.header() {
            let opens_expression = matches!(header.keyword.as_str(), "measure" | "column")
                && header.assignment == Assignment::Open;
            if opens_expression {
                current = Some(Expr {
                    depth: token.depth,
                    return_depth: None,
                });
            }
        }
    }
}

/// TMDL005–TMDL008: indentation inside `source = { ... }` blocks.
pub(super) fn partition_source_blocks(cx: &LintContext<'_>, issues: &mut Vec<Issue>) {
    let mut required: Option<usize> = None;

    for token in cx.tokens {
        let line = cx.document.line(token.index);

        if let Some(expected) = required {
            if line.trim_start().starts_with('}') {
                required = None;
                continue;
            }
            if token.is_blank() || is_comment(line) {
                continue;
            }

            if cx.uses_tabs() {
                let lead = leading_whitespace(line);
                let has_tabs = lead.contains('\t');
                let has_spaces = lead.contains(' ');
                if has_spaces && !has_tabs {
                    issues.push(cx.issue(
                        token.index,
                        Severity::Error,
                        "TMDL005",
                        "Partition source is indented with spaces but the file uses tabs".to_string(),
                    ));
                    continue;
                }
                if has_spaces && has_tabs {
                    issues.push(cx.issue(
                        token.index,
                        Severity::Error,
                        "TMDL006",
                        "Partition source mixes tabs and spaces. Use only tabs for indentation"
                            .to_string(),
                    ));
                    continue;
                }
            }

            if token.depth < expected {
                issues.push(cx.issue(
                    token.index,
                    Severity::Error,
                    "TMDL007",
                    format!(
                        "Partition source has insufficient indentation. Expected {} levels, got {}",
                        expected, token.depth
                    ),
                ));
            } else if token.depth > expected {
                issues.push(cx.issue(
                    token.index,
                    Severity::Warning,
                    "TMDL008",
                    format!(
                        "Partition source has excessive indentation. Expected {} levels, got {}",
                        expected, token.depth
                    ),
                ));
            }
            continue;
        }

        if SOURCE_BRACE.is_match(line) && !brace_closes(line) {
            required = Some(token.depth + 1);
        }
    }
}

/// TMDL009: `source = {` inside a calculated partition.
pub(super) fn calculated_partition_source(cx: &LintContext<'_>, issues: &mut Vec<Issue>) {
    let doc = cx.document;
    for index in 0..doc.line_count() {
        if !SOURCE_BRACE.is_match(doc.line(index)) {
            continue;
        }
        let first = index.saturating_sub(PARTITION_LOOKBACK);
        for prev in (first..index).rev() {
            let prev_line = doc.line(prev);
            if CALCULATED_PARTITION.is_match(prev_line) {
                issues.push(cx.issue(
                    index,
                    Severity::Error,
                    "TMDL009",
                    "Calculated partitions must use 'expression :=' not 'source ='".to_string(),
                ));
                break;
            }
            if PARTITION_OR_TABLE.is_match(prev_line) {
                break;
            }
        }
    }
}

/// TMDL010: `expression := {` table constructors must stay on one line.
pub(super) fn inline_table_constructor(cx: &LintContext<'_>, issues: &mut Vec<Issue>) {
    let doc = cx.document;
    for index in 0..doc.line_count() {
        let line = doc.line(index);
        if EXPRESSION_BRACE.is_match(line) && !brace_closes(line) {
            issues.push(cx.issue(
                index,
                Severity::Error,
                "TMDL010",
                "Table constructor 'expression := { }' must be on a single line".to_string(),
            ));
        }
    }
}

/// TMDL011: tabs and spaces mixed at structural depth.
pub(super) fn mixed_indentation(cx: &LintContext<'_>, issues: &mut Vec<Issue>) {
    for token in cx.tokens {
        if token.is_blank() || !token.mixed_indent {
            continue;
        }
        let line = cx.document.line(token.index);
        let leading_tabs = line.chars().take_while(|&c| c == '\t').count();
        if leading_tabs <= STRUCTURAL_TAB_DEPTH {
            issues.push(cx.issue(
                token.index,
                Severity::Error,
                "TMDL011",
                "Mixed tabs and spaces at structural indentation level".to_string(),
            ));
        }
    }
}

/// True if a `}` follows the first `{` on the line.
fn brace_closes(line: &str) -> bool {
    line.find('{')
        .is_some_and(|open| line[open..].contains('}'))
}
