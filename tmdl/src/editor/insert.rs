//! New declarations: M partitions added to a table, and whole tables.

use std::fmt;

use super::{Editor, Reindent, normalize_body};
use crate::document::{Document, IndentUnit};
use crate::error::EditError;
use crate::parser::parse_outline;

/// Storage mode written as the partition's `mode:` property.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PartitionMode {
    #[default]
    Import,
    DirectQuery,
    Dual,
}

impl PartitionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PartitionMode::Import => "import",
            PartitionMode::DirectQuery => "directQuery",
            PartitionMode::Dual => "dual",
        }
    }
}

impl fmt::Display for PartitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An M partition to be written into a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPartition {
    pub name: String,
    /// Power Query (M) source, re-indented under `source =`.
    pub source: String,
    pub mode: PartitionMode,
}

impl NewPartition {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        NewPartition {
            name: name.into(),
            source: source.into(),
            mode: PartitionMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: PartitionMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Render an object name for a declaration line. Identifiers stay bare,
/// anything else is single-quoted with `'` doubled.
pub fn quote_name(name: &str) -> String {
    let mut chars = name.chars();
    let bare = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_');
    if bare {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

impl Editor {
    /// Add an M partition to `table`, after its last partition or at the
    /// end of the table when it has none.
    pub fn add_partition(
        &self,
        document: &Document,
        table: &str,
        partition: &NewPartition,
    ) -> Result<Document, EditError> {
        let outline = parse_outline(&self.tokenizer.tokenize(document));
        let node = outline
            .find("table", table)
            .ok_or_else(|| EditError::TableNotFound {
                name: table.to_string(),
            })?;

        let partitions = node.children.iter().filter(|c| c.keyword == "partition");
        if partitions.clone().any(|c| c.name == partition.name) {
            return Err(EditError::DuplicateObject {
                keyword: "partition".to_string(),
                name: partition.name.clone(),
            });
        }
        let at = partitions.last().map_or(node.lines.end, |p| p.lines.end);

        let block = partition_block(document.indent_unit(), node.depth + 1, partition);
        Ok(insert_block(document, at, &block))
    }

    /// Append a new table holding a single M partition.
    pub fn create_table(
        &self,
        document: &Document,
        table: &str,
        partition: &NewPartition,
    ) -> Result<Document, EditError> {
        let outline = parse_outline(&self.tokenizer.tokenize(document));
        if outline.find("table", table).is_some() {
            return Err(EditError::DuplicateObject {
                keyword: "table".to_string(),
                name: table.to_string(),
            });
        }

        let mut block = vec![format!("table {}", quote_name(table)), String::new()];
        block.extend(partition_block(document.indent_unit(), 1, partition));
        Ok(insert_block(document, document.line_count(), &block))
    }
}

/// `partition <name> = m` at `depth`, its `mode:` and `source =` one level
/// deeper and the M code one level below that.
fn partition_block(unit: IndentUnit, depth: usize, partition: &NewPartition) -> Vec<String> {
    let mut lines = vec![
        format!("{}partition {} = m", unit.render(depth), quote_name(&partition.name)),
        format!("{}mode: {}", unit.render(depth + 1), partition.mode),
        format!("{}source =", unit.render(depth + 1)),
    ];
    lines.extend(normalize_body(
        &partition.source,
        unit,
        depth + 2,
        Reindent::Relative,
    ));
    lines
}

/// Insert `block` before line `at`, separated by one blank line from
/// non-blank neighbours.
fn insert_block(document: &Document, at: usize, block: &[String]) -> Document {
    let eol = document.line_ending().as_str();
    let count = document.line_count();

    let mut out = String::with_capacity(document.text().len() + block.len() * 32);
    out.push_str(document.slice(0..at));
    if at > 0 {
        if at == count && !document.ends_with_terminator() {
            out.push_str(eol);
        }
        if !document.line(at - 1).trim().is_empty() {
            out.push_str(eol);
        }
    }

    for line in block {
        out.push_str(line);
        out.push_str(eol);
    }

    if at < count && !document.line(at).trim().is_empty() {
        out.push_str(eol);
    }
    out.push_str(document.slice(at..count));
    Document::new(out)
}
