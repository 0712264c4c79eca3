//! Runs the external authoritative TMDL validator and reads its JSON report.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How many parent directories to search for a `.SemanticModel` folder.
const MODEL_DIR_SEARCH_DEPTH: usize = 3;

/// JSON printed by the validator on stdout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub line_number: Option<usize>,
    #[serde(default)]
    pub document: Option<String>,
    #[serde(default)]
    pub line_text: Option<String>,
    #[serde(default)]
    pub database_name: Option<String>,
    #[serde(default)]
    pub compatibility_level: Option<u32>,
}

impl ValidationReport {
    pub fn summary(&self) -> String {
        if self.is_valid {
            return match (&self.database_name, self.compatibility_level) {
                (Some(name), Some(level)) => {
                    format!("valid: {} (compatibility level {})", name, level)
                }
                (Some(name), None) => format!("valid: {}", name),
                _ => "valid".to_string(),
            };
        }

        let mut out = format!(
            "{}: {}",
            self.error_type.as_deref().unwrap_or("ValidationError"),
            self.message.as_deref().unwrap_or("(no message)")
        );
        if let Some(document) = &self.document {
            out.push_str(&format!("\n  in {}", document));
            if let Some(line) = self.line_number {
                out.push_str(&format!(":{}", line));
            }
        }
        if let Some(text) = &self.line_text {
            out.push_str(&format!("\n  > {}", text.trim_end()));
        }
        out
    }
}

/// Outcome of trying to run the validator.
#[derive(Debug)]
pub enum Validation {
    Completed(ValidationReport),
    /// No executable configured, or it could not be found.
    Skipped(String),
}

/// The nearest `*.SemanticModel` ancestor of `file`, else its directory.
pub fn semantic_model_dir(file: &Path) -> PathBuf {
    let start = file.parent().unwrap_or(Path::new("."));
    for dir in start.ancestors().take(MODEL_DIR_SEARCH_DEPTH + 1) {
        let is_model = dir
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".SemanticModel"));
        if is_model {
            return dir.to_path_buf();
        }
    }
    start.to_path_buf()
}

/// Run `exe --path <model dir> --json` for the model containing `file`.
pub fn run(exe: Option<&Path>, file: &Path) -> Result<Validation> {
    let Some(exe) = exe else {
        return Ok(Validation::Skipped(
            "no validator configured ([validator] path in tmdl.toml)".to_string(),
        ));
    };

    let model_dir = semantic_model_dir(file);
    debug!(exe = %exe.display(), dir = %model_dir.display(), "running validator");

    let output = match Command::new(exe)
        .arg("--path")
        .arg(&model_dir)
        .arg("--json")
        .output()
    {
        Ok(output) => output,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(exe = %exe.display(), "validator not found");
            return Ok(Validation::Skipped(format!(
                "validator not found at {}",
                exe.display()
            )));
        }
        Err(e) => {
            return Err(e).with_context(|| format!("failed to run validator {}", exe.display()));
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    if stdout.trim().is_empty() {
        bail!(
            "validator exited with {} and printed no report: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let report = parse_report(&stdout)?;
    Ok(Validation::Completed(report))
}

pub fn parse_report(stdout: &str) -> Result<ValidationReport> {
    serde_json::from_str(stdout.trim()).context("validator printed malformed JSON")
}
