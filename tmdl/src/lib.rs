pub mod diff;
pub mod document;
pub mod editor;
pub mod error;
pub mod fs;
pub mod lint;
pub mod parser;

pub use document::{Document, IndentUnit, LineEnding};
pub use editor::{
    Editor, NewPartition, ObjectSpan, PartitionMode, Reindent, Scope, edit_named_object,
    extract_body, locate, replace_body,
};
pub use error::{EditError, Warning};
pub use fs::{BackupPolicy, EditRequest, FileEdit};
pub use lint::{Issue, LintOptions, Severity, lint};
pub use parser::{Outline, OutlineNode};
