use std::path::PathBuf;

use tempfile::TempDir;
use tmdl::fs::{apply_to_file, edit_file, preview_file, sidecar_path};
use tmdl::{BackupPolicy, EditError, EditRequest, Editor, Scope};

const MODEL: &str = "table Commissions\n\
\tmeasure 'Rate' =\n\
\t\t0.05\n\
\tformatString: 0.00%\n\
\n\
\tmeasure 'Base' =\n\
\t\t100\n";

fn model_file(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("Commissions.tmdl");
    std::fs::write(&path, MODEL).unwrap();
    path
}

#[test]
fn sidecar_backup_holds_the_original() {
    let dir = TempDir::new().unwrap();
    let path = model_file(&dir);

    let request = EditRequest::new("measure", "Rate", "0.07");
    let edit = edit_file(&Editor::new(), &path, &request, BackupPolicy::WriteSidecar).unwrap();

    assert!(edit.written);
    assert!(edit.original.is_none());
    let backup = edit.backup_path.clone().unwrap();
    assert_eq!(backup, dir.path().join("Commissions.tmdl.backup"));
    assert_eq!(std::fs::read_to_string(&backup).unwrap(), MODEL);

    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, edit.document.text());
    assert!(written.contains("\t\t0.07\n\tformatString: 0.00%\n"));
    assert!(edit.diff.contains("-\t\t0.05"));
    assert!(edit.diff.contains("+\t\t0.07"));
}

#[test]
fn original_returned_alongside_without_sidecar() {
    let dir = TempDir::new().unwrap();
    let path = model_file(&dir);

    let request = EditRequest::new("measure", "Base", "200");
    let edit = edit_file(
        &Editor::new(),
        &path,
        &request,
        BackupPolicy::ReturnOriginalAlongside,
    )
    .unwrap();

    assert_eq!(edit.original.as_ref().map(|d| d.text()), Some(MODEL));
    assert!(edit.backup_path.is_none());
    assert!(!sidecar_path(&path).exists());
    assert!(std::fs::read_to_string(&path).unwrap().ends_with("\t\t200\n"));
}

#[test]
fn no_backup_policy_writes_only_the_target() {
    let dir = TempDir::new().unwrap();
    let path = model_file(&dir);

    let request = EditRequest::new("measure", "Base", "1").in_table("Commissions");
    let edit = edit_file(&Editor::new(), &path, &request, BackupPolicy::None).unwrap();

    assert!(edit.original.is_none());
    assert!(edit.backup_path.is_none());
    let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[test]
fn preview_leaves_the_file_alone() {
    let dir = TempDir::new().unwrap();
    let path = model_file(&dir);

    let request = EditRequest::new("measure", "Rate", "0.10");
    let edit = preview_file(&Editor::new(), &path, &request).unwrap();

    assert!(!edit.written);
    assert!(edit.document.text().contains("0.10"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), MODEL);
    assert!(!sidecar_path(&path).exists());
}

#[test]
fn failed_edit_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let path = model_file(&dir);

    let request = EditRequest::new("measure", "Missing", "1");
    let err = edit_file(&Editor::new(), &path, &request, BackupPolicy::WriteSidecar).unwrap_err();

    assert!(matches!(err, EditError::ObjectNotFound { .. }));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), MODEL);
    assert!(!sidecar_path(&path).exists());
}

#[test]
fn unknown_table_scope_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = model_file(&dir);

    let mut request = EditRequest::new("measure", "Rate", "1");
    request.scope = Scope::Table("Sales".into());
    let err = edit_file(&Editor::new(), &path, &request, BackupPolicy::None).unwrap_err();
    assert!(matches!(err, EditError::TableNotFound { ref name } if name == "Sales"));
}

#[test]
fn apply_uses_the_supplied_original() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("model.tmdl");

    let original = tmdl::Document::new("measure 'M' =\n\t1\n");
    let request = EditRequest::new("measure", "M", "2");
    apply_to_file(&Editor::new(), &path, original, &request, BackupPolicy::None).unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "measure 'M' =\n\t2\n");
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.tmdl");

    let request = EditRequest::new("measure", "M", "2");
    let err = edit_file(&Editor::new(), &path, &request, BackupPolicy::None).unwrap_err();
    assert_eq!(err.kind(), "Io");
}

#[cfg(unix)]
#[test]
fn rewrite_keeps_file_mode() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let path = model_file(&dir);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

    let request = EditRequest::new("measure", "Rate", "0.08");
    edit_file(&Editor::new(), &path, &request, BackupPolicy::None).unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o644);
}

#[test]
fn pending_edit_persists_with_policy() {
    let dir = TempDir::new().unwrap();
    let path = model_file(&dir);

    let original = tmdl::fs::read_document(&path).unwrap();
    let document = tmdl::Document::new("table Commissions\n");
    let edit = tmdl::fs::pending(original, document);
    assert!(!edit.written);
    assert!(edit.diff.contains("-\tmeasure 'Rate' ="));

    let edit = tmdl::fs::persist(&path, edit, BackupPolicy::WriteSidecar).unwrap();
    assert!(edit.written);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "table Commissions\n");
    assert_eq!(std::fs::read_to_string(sidecar_path(&path)).unwrap(), MODEL);
}
