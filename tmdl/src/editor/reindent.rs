use crate::document::indent::leading_whitespace;
use crate::document::{Document, IndentUnit};

/// How replacement text is re-indented under an object header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Reindent {
    /// Discard each line's own indentation; every line lands at the body depth.
    #[default]
    Flatten,
    /// Remove the common indentation only, keeping relative nesting
    /// (converted to the document's unit).
    Relative,
}

/// Turn free-form replacement text into body lines (no terminators).
///
/// Leading and trailing blank lines are dropped. Interior blank lines
/// become empty strings so no trailing whitespace is introduced.
pub fn normalize_body(text: &str, unit: IndentUnit, depth: usize, policy: Reindent) -> Vec<String> {
    let source = Document::new(text);
    let lines: Vec<&str> = source.lines().collect();

    let Some(first) = lines.iter().position(|l| !l.trim().is_empty()) else {
        return Vec::new();
    };
    let last = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .unwrap_or(first);
    let lines = &lines[first..=last];

    // Relative nesting is measured in the replacement's own unit.
    let input_unit = source.indent_unit();
    let base = match policy {
        Reindent::Flatten => 0,
        Reindent::Relative => lines
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| input_unit.depth_of(l))
            .min()
            .unwrap_or(0),
    };

    lines
        .iter()
        .map(|line| {
            if line.trim().is_empty() {
                return String::new();
            }
            let extra = match policy {
                Reindent::Flatten => 0,
                Reindent::Relative => input_unit.depth_of(line) - base,
            };
            let content = &line[leading_whitespace(line).len()..];
            let mut out = unit.render(depth + extra);
            out.push_str(content);
            out
        })
        .collect()
}
