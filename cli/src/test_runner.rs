use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use tmdl::{Document, Editor, Issue, LintOptions, Reindent, Scope, Warning, lint};

use crate::config::ReindentSetting;

const TEST_SUFFIX: &str = ".test.tmdl";

#[derive(Debug, Deserialize)]
pub struct ExpectedIssue {
    /// Lint code, e.g. `TMDL011`.
    pub code: String,

    /// If set, the issue must be reported on this 1-based line.
    #[serde(default)]
    pub line: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ExpectedWarning {
    /// Substring that must appear in the warning message.
    pub contains: String,

    /// If set, the edited declaration must be on this 1-based line.
    #[serde(default)]
    pub line: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Object keyword to edit. Without it the file is only linted.
    #[serde(default)]
    pub keyword: Option<String>,

    /// Object name to edit.
    #[serde(default)]
    pub name: Option<String>,

    /// Restrict the lookup to this table.
    #[serde(default)]
    pub table: Option<String>,

    /// Replacement body.
    #[serde(default)]
    pub body: String,

    #[serde(default)]
    pub reindent: Option<ReindentSetting>,

    #[serde(default)]
    pub extra_property_keywords: Vec<String>,

    /// Expected document after the edit (exact comparison).
    #[serde(default)]
    pub expect_output: Option<String>,

    /// Expected edit failure: an error kind such as `ObjectNotFound`, or a
    /// substring of the error message.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// Expected lint issues of the source. If present (even empty), issue
    /// count and codes are checked.
    #[serde(default)]
    pub expect_issues: Option<Vec<ExpectedIssue>>,

    /// Expected edit warnings. If present (even empty), they are checked.
    #[serde(default)]
    pub expect_warnings: Option<Vec<ExpectedWarning>>,
}

/// Split a `.test.tmdl` file into its TOML frontmatter and TMDL source.
///
/// The frontmatter sits between two `---` lines at the top of the file.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let Some((first, mut rest)) = content.split_once('\n') else {
        return Err("missing opening --- frontmatter delimiter".into());
    };
    if first.trim_end_matches('\r') != "---" {
        return Err("missing opening --- frontmatter delimiter".into());
    }

    let frontmatter_start = rest;
    let mut frontmatter_len = 0;
    loop {
        let (line, next) = match rest.split_once('\n') {
            Some((line, next)) => (line, Some(next)),
            None => (rest, None),
        };
        if line.trim_end_matches('\r') == "---" {
            let config: TestConfig = toml::from_str(&frontmatter_start[..frontmatter_len])
                .map_err(|e| format!("TOML parse error: {}", e))?;
            return Ok((config, next.unwrap_or("")));
        }
        match next {
            Some(next) => {
                frontmatter_len += line.len() + 1;
                rest = next;
            }
            None => return Err("missing closing --- frontmatter delimiter".into()),
        }
    }
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

fn run_single_test(path: &Path) -> TestResult {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("cannot read file: {}", e)),
            };
        }
    };

    let (config, source) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("frontmatter error: {}", e)),
            };
        }
    };

    let outcome = match check(&config, source) {
        None => TestOutcome::Pass,
        Some(reason) => TestOutcome::Fail(reason),
    };

    TestResult {
        path: path.to_path_buf(),
        description: config.description,
        outcome,
    }
}

/// Run the checks a test file asks for. Returns `Some(reason)` on the first mismatch.
fn check(config: &TestConfig, source: &str) -> Option<String> {
    let document = Document::new(source);

    if let Some(expected) = &config.expect_issues {
        let options = LintOptions {
            extra_property_keywords: config.extra_property_keywords.clone(),
            ..LintOptions::default()
        };
        let issues = lint(&document, &options);
        if let Some(reason) = check_issues(&issues, expected) {
            return Some(reason);
        }
    }

    let (keyword, name) = match (&config.keyword, &config.name) {
        (Some(keyword), Some(name)) => (keyword, name),
        (None, None) => {
            if config.expect_output.is_some() || config.expect_error.is_some() {
                return Some("expect_output/expect_error need keyword and name".into());
            }
            return None;
        }
        _ => return Some("keyword and name must be given together".into()),
    };

    let editor = Editor::new()
        .with_property_keywords(config.extra_property_keywords.iter().cloned())
        .with_reindent(config.reindent.map(Reindent::from).unwrap_or_default());
    let scope = match &config.table {
        Some(table) => Scope::Table(table.clone()),
        None => Scope::Document,
    };

    let result = editor
        .locate_in(&document, &scope, keyword, name)
        .and_then(|span| {
            let edited = editor.replace_body(&document, &span, &config.body)?;
            Ok((edited, span.warnings()))
        });

    match (&config.expect_error, &config.expect_output, result) {
        (Some(expected), _, Err(err)) => {
            if err.kind() == expected.as_str() || err.to_string().contains(expected.as_str()) {
                None
            } else {
                Some(format!("expected error \"{}\", got: {}", expected, err))
            }
        }
        (Some(expected), _, Ok(_)) => Some(format!(
            "expected error \"{}\", but the edit succeeded",
            expected
        )),
        (None, _, Err(err)) => Some(format!("unexpected error: [{}] {}", err.kind(), err)),
        (None, expected_output, Ok((edited, warnings))) => {
            if let Some(expected) = expected_output {
                if edited.text() != expected.as_str() {
                    return Some(format!(
                        "output mismatch\n  expected: {:?}\n  actual:   {:?}",
                        expected,
                        edited.text()
                    ));
                }
            }
            match &config.expect_warnings {
                Some(expected) => check_warnings(&warnings, expected),
                None => None,
            }
        }
    }
}

fn check_issues(issues: &[Issue], expected: &[ExpectedIssue]) -> Option<String> {
    if issues.len() != expected.len() {
        let actual: Vec<String> = issues
            .iter()
            .map(|i| format!("  - line {} {}: {}", i.line, i.code, i.message))
            .collect();
        return Some(format!(
            "expected {} issue(s), got {}\n  actual issues:\n{}",
            expected.len(),
            issues.len(),
            if actual.is_empty() {
                "    (none)".to_string()
            } else {
                actual.join("\n")
            }
        ));
    }

    for (i, (actual, expected)) in issues.iter().zip(expected.iter()).enumerate() {
        if actual.code != expected.code {
            return Some(format!(
                "issue[{}]: expected {}, got {} on line {}",
                i, expected.code, actual.code, actual.line
            ));
        }
        if let Some(line) = expected.line {
            if actual.line != line {
                return Some(format!(
                    "issue[{}]: expected {} on line {}, got line {}",
                    i, expected.code, line, actual.line
                ));
            }
        }
    }

    None
}

fn check_warnings(warnings: &[Warning], expected: &[ExpectedWarning]) -> Option<String> {
    if warnings.len() != expected.len() {
        return Some(format!(
            "expected {} warning(s), got {}",
            expected.len(),
            warnings.len()
        ));
    }

    for (i, (actual, expected)) in warnings.iter().zip(expected.iter()).enumerate() {
        let msg = actual.message();
        if !msg.contains(&expected.contains) {
            return Some(format!(
                "warning[{}]: expected message containing \"{}\", got: {}",
                i, expected.contains, msg
            ));
        }
        if let Some(line) = expected.line {
            let Warning::AmbiguousName { used, .. } = actual;
            if used + 1 != line {
                return Some(format!(
                    "warning[{}]: expected on line {}, got line {}",
                    i,
                    line,
                    used + 1
                ));
            }
        }
    }

    None
}

/// Test files keyed by category: the folder path below the test root,
/// `/`-separated, with `""` for files in the root itself.
type Categories = BTreeMap<String, Vec<PathBuf>>;

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

fn is_test_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(TEST_SUFFIX))
}

/// Walk `root` and group every test file by the folder it lives in.
fn discover(root: &Path) -> Categories {
    let mut categories = Categories::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            debug!(dir = %dir.display(), "skipping unreadable directory");
            continue;
        };
        let category = dir
            .strip_prefix(root)
            .map(|rel| {
                rel.components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_default();

        for path in entries.flatten().map(|entry| entry.path()) {
            if path.is_dir() {
                pending.push(path);
            } else if is_test_file(&path) {
                categories.entry(category.clone()).or_default().push(path);
            }
        }
    }

    categories.values_mut().for_each(|files| files.sort());
    categories
}

/// Keep the categories named in `requested`. A name also selects its
/// subfolders. An empty request keeps everything.
fn filter_categories(all: Categories, requested: &[String]) -> Categories {
    if requested.is_empty() {
        return all;
    }

    let wanted: Vec<&str> = requested.iter().map(|r| r.trim_matches('/')).collect();
    for name in &wanted {
        if !all.keys().any(|cat| in_category(cat, name)) {
            let available: Vec<&str> = all.keys().map(|k| category_label(k)).collect();
            eprintln!(
                "warning: category '{}' not found (available: {})",
                name,
                available.join(", ")
            );
        }
    }

    all.into_iter()
        .filter(|(cat, _)| wanted.iter().any(|name| in_category(cat, name)))
        .collect()
}

fn in_category(category: &str, name: &str) -> bool {
    category
        .strip_prefix(name)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// The tests `path` refers to: a single file, or every test below a folder
/// narrowed to `requested` categories.
fn select(path: &Path, requested: &[String]) -> Result<Categories, String> {
    if path.is_file() {
        return Ok(Categories::from([(String::new(), vec![path.to_path_buf()])]));
    }
    let all = discover(path);
    if all.is_empty() {
        return Err(format!("no {} files found in {}", TEST_SUFFIX, path.display()));
    }
    let selected = filter_categories(all, requested);
    if selected.is_empty() {
        return Err("no matching categories found".into());
    }
    Ok(selected)
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }
    match select(path, &[]) {
        Ok(categories) => {
            eprintln!("available categories:");
            for (category, files) in &categories {
                eprintln!("  {} ({} tests)", category_label(category), files.len());
            }
        }
        Err(message) => eprintln!("{}", message),
    }
}

/// ANSI styling for the report, or plain text with `--no-color`.
#[derive(Clone, Copy)]
struct Palette {
    color: bool,
}

impl Palette {
    fn paint(self, code: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        } else {
            text.to_string()
        }
    }

    fn pass(self) -> String {
        self.paint("32", "PASS")
    }

    fn fail(self) -> String {
        self.paint("31", "FAIL")
    }

    fn heading(self, text: &str) -> String {
        self.paint("1", text)
    }
}

fn label_for(result: &TestResult) -> &str {
    if let Some(description) = &result.description {
        return description;
    }
    result
        .path
        .file_name()
        .and_then(|s| s.to_str())
        .map_or("?", |s| s.trim_end_matches(TEST_SUFFIX))
}

/// Run every selected test and print a report to stderr.
/// Returns the exit code: 0 when all pass, 1 otherwise.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let palette = Palette { color: !no_color };
    let selected = match select(path, categories) {
        Ok(selected) => selected,
        Err(message) => {
            eprintln!("{}", message);
            return 1;
        }
    };

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (category, files) in &selected {
        if !path.is_file() {
            eprintln!("\n{}", palette.heading(category_label(category)));
        }
        for file in files {
            let result = run_single_test(file);
            if let TestOutcome::Fail(_) = result.outcome {
                eprintln!("  {}  {}", palette.fail(), label_for(&result));
                failures.push(result);
            } else {
                eprintln!("  {}  {}", palette.pass(), label_for(&result));
                passed += 1;
            }
        }
    }

    if !failures.is_empty() {
        eprintln!("\nfailures:");
        for failure in &failures {
            eprintln!("\n  --- {} ---", failure.path.display());
            if let TestOutcome::Fail(reason) = &failure.outcome {
                reason.lines().for_each(|line| eprintln!("  {}", line));
            }
        }
    }

    let failed = failures.len();
    debug!(passed, failed, "test run finished");
    if failed == 0 {
        eprintln!("\ntest result: {}. {} passed, 0 failed", palette.paint("32", "ok"), passed);
        0
    } else {
        eprintln!(
            "\ntest result: {}. {} passed, {} failed (of {})",
            palette.paint("31", "FAILED"),
            passed,
            failed,
            passed + failed
        );
        1
    }
}
