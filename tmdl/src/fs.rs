//! Reading, backing up and atomically rewriting TMDL files.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::diff::unified_diff;
use crate::document::Document;
use crate::editor::{Editor, Scope};
use crate::error::{EditError, Warning};

/// What to do with the pre-edit document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackupPolicy {
    /// Keep nothing.
    None,
    /// Write `<file>.backup` next to the target before replacing it.
    #[default]
    WriteSidecar,
    /// Hand the original back in [`FileEdit::original`] and write nothing extra.
    ReturnOriginalAlongside,
}

/// One object body replacement.
#[derive(Debug, Clone)]
pub struct EditRequest {
    pub keyword: String,
    pub name: String,
    pub body: String,
    pub scope: Scope,
}

impl EditRequest {
    pub fn new(keyword: impl Into<String>, name: impl Into<String>, body: impl Into<String>) -> Self {
        EditRequest {
            keyword: keyword.into(),
            name: name.into(),
            body: body.into(),
            scope: Scope::Document,
        }
    }

    pub fn in_table(mut self, table: impl Into<String>) -> Self {
        self.scope = Scope::Table(table.into());
        self
    }
}

/// Result of editing a file (or previewing the edit).
#[derive(Debug, Clone)]
pub struct FileEdit {
    pub document: Document,
    /// Present under [`BackupPolicy::ReturnOriginalAlongside`].
    pub original: Option<Document>,
    /// Present under [`BackupPolicy::WriteSidecar`].
    pub backup_path: Option<PathBuf>,
    pub diff: String,
    pub warnings: Vec<Warning>,
    /// False for previews.
    pub written: bool,
}

/// Read a UTF-8 TMDL file.
pub fn read_document(path: &Path) -> Result<Document, EditError> {
    let text = std::fs::read_to_string(path).map_err(|e| EditError::io(path, e))?;
    Ok(Document::new(text))
}

/// `Commissions.tmdl` -> `Commissions.tmdl.backup`
pub fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".backup");
    PathBuf::from(name)
}

/// Read `path`, apply `request`, back up per `policy`, and write the result.
pub fn edit_file(
    editor: &Editor,
    path: &Path,
    request: &EditRequest,
    policy: BackupPolicy,
) -> Result<FileEdit, EditError> {
    let original = read_document(path)?;
    apply_to_file(editor, path, original, request, policy)
}

/// Apply `request` to an already-read `original` and write it back to `path`.
///
/// The edit is computed fully in memory first; on failure nothing is written.
pub fn apply_to_file(
    editor: &Editor,
    path: &Path,
    original: Document,
    request: &EditRequest,
    policy: BackupPolicy,
) -> Result<FileEdit, EditError> {
    let edit = preview(editor, original, request)?;
    persist(path, edit, policy)
}

/// Back up the original of `edit` per `policy`, then write its document to `path`.
pub fn persist(path: &Path, mut edit: FileEdit, policy: BackupPolicy) -> Result<FileEdit, EditError> {
    let original = edit.original.take();
    if policy == BackupPolicy::WriteSidecar {
        if let Some(original) = &original {
            let backup = sidecar_path(path);
            std::fs::write(&backup, original.text()).map_err(|e| EditError::io(&backup, e))?;
            debug!(backup = %backup.display(), "wrote backup");
            edit.backup_path = Some(backup);
        }
    }
    if policy == BackupPolicy::ReturnOriginalAlongside {
        edit.original = original;
    }

    write_atomic(path, edit.document.text())?;
    debug!(path = %path.display(), bytes = edit.document.text().len(), "persisted edit");
    edit.written = true;
    Ok(edit)
}

/// An unwritten edit turning `original` into `document`.
pub fn pending(original: Document, document: Document) -> FileEdit {
    let diff = unified_diff(original.text(), document.text());
    FileEdit {
        document,
        original: Some(original),
        backup_path: None,
        diff,
        warnings: Vec::new(),
        written: false,
    }
}

/// Compute an edit without touching the file system beyond reading `path`.
pub fn preview_file(editor: &Editor, path: &Path, request: &EditRequest) -> Result<FileEdit, EditError> {
    let original = read_document(path)?;
    preview(editor, original, request)
}

/// Compute an edit of an in-memory document. The original is kept in
/// [`FileEdit::original`].
pub fn preview(editor: &Editor, original: Document, request: &EditRequest) -> Result<FileEdit, EditError> {
    let span = editor.locate_in(&original, &request.scope, &request.keyword, &request.name)?;
    let document = editor.replace_body(&original, &span, &request.body)?;
    let mut edit = pending(original, document);
    edit.warnings = span.warnings();
    Ok(edit)
}

/// Write through a temporary file in the target's directory, then rename over it.
/// An existing target keeps its permissions.
fn write_atomic(path: &Path, contents: &str) -> Result<(), EditError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| EditError::io(dir, e))?;
    temp.write_all(contents.as_bytes())
        .map_err(|e| EditError::io(temp.path(), e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| EditError::io(temp.path(), e))?;
    match std::fs::metadata(path) {
        Ok(meta) => temp
            .as_file()
            .set_permissions(meta.permissions())
            .map_err(|e| EditError::io(temp.path(), e))?,
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(EditError::io(path, e)),
    }
    temp.persist(path).map_err(|e| EditError::io(path, e.error))?;
    Ok(())
}
