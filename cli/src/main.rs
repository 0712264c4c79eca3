mod config;
mod test_runner;
mod validator;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use tmdl::fs::{FileEdit, apply_to_file, pending, persist, preview, read_document};
use tmdl::{Document, EditError, EditRequest, Editor, NewPartition, OutlineNode, Scope};

use crate::config::{BackupSetting, Config, ModeSetting, ReindentSetting};
use crate::validator::Validation;

#[derive(Parser)]
#[command(name = "tmdl", version, about = "Edit and check TMDL semantic model files")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Raise log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file (defaults to ./tmdl.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replace the body of a named object
    Edit(EditArgs),

    /// Add an M partition to an existing table
    AddPartition(AddPartitionArgs),

    /// Append a new table with one M partition
    CreateTable(CreateTableArgs),

    /// Print the body of a named object
    Extract(ExtractArgs),

    /// Print the object outline of a file
    List(ListArgs),

    /// Check a file for common format problems
    Lint(LintArgs),

    /// Run the external validator on the model containing a file
    Validate(ValidateArgs),

    /// Run .test.tmdl test files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct EditArgs {
    /// TMDL file to edit
    file: PathBuf,

    /// Object keyword (measure, column, partition, ...)
    keyword: String,

    /// Object name, without quotes
    name: String,

    /// File holding the new body ("-" reads stdin)
    body_file: PathBuf,

    /// Only look inside this table
    #[arg(long)]
    table: Option<String>,

    /// What to keep of the original file
    #[arg(long, value_enum)]
    backup: Option<BackupSetting>,

    /// How to indent the new body
    #[arg(long, value_enum)]
    reindent: Option<ReindentSetting>,

    /// Print a unified diff instead of writing
    #[arg(long)]
    dry_run: bool,
}

/// Flags shared by commands that write a new declaration.
#[derive(clap::Args)]
struct WriteArgs {
    /// Partition storage mode
    #[arg(long, value_enum, default_value_t = ModeSetting::Import)]
    mode: ModeSetting,

    /// What to keep of the original file
    #[arg(long, value_enum)]
    backup: Option<BackupSetting>,

    /// Print a unified diff instead of writing
    #[arg(long)]
    dry_run: bool,
}

#[derive(clap::Args)]
struct AddPartitionArgs {
    /// TMDL file to edit
    file: PathBuf,

    /// Table that receives the partition
    table: String,

    /// Partition name, without quotes
    name: String,

    /// File holding the M code ("-" reads stdin)
    source_file: PathBuf,

    #[command(flatten)]
    write: WriteArgs,
}

#[derive(clap::Args)]
struct CreateTableArgs {
    /// TMDL file to extend
    file: PathBuf,

    /// Name of the new table
    table: String,

    /// File holding the M code ("-" reads stdin)
    source_file: PathBuf,

    /// Partition name (defaults to the table name)
    #[arg(long)]
    partition: Option<String>,

    #[command(flatten)]
    write: WriteArgs,
}

#[derive(clap::Args)]
struct ExtractArgs {
    file: PathBuf,
    keyword: String,
    name: String,

    /// Only look inside this table
    #[arg(long)]
    table: Option<String>,
}

#[derive(clap::Args)]
struct ListArgs {
    file: PathBuf,
}

#[derive(clap::Args)]
struct LintArgs {
    file: PathBuf,

    /// Print issues as JSON
    #[arg(long)]
    json: bool,

    /// Also run the external validator
    #[arg(long)]
    authoritative: bool,
}

#[derive(clap::Args)]
struct ValidateArgs {
    file: PathBuf,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.tmdl file or directory containing them
    path: PathBuf,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {:#}", e);
            process::exit(2);
        }
    };

    let reporter = Reporter::new(cli.no_color);
    let code = match cli.command {
        Command::Edit(args) => do_edit(args, &config, &reporter),
        Command::AddPartition(args) => do_add_partition(args, &config, &reporter),
        Command::CreateTable(args) => do_create_table(args, &config, &reporter),
        Command::Extract(args) => do_extract(args, &config, &reporter),
        Command::List(args) => do_list(args, &reporter),
        Command::Lint(args) => do_lint(args, &config, &reporter),
        Command::Validate(args) => do_validate(args, &config),
        Command::Test(args) => {
            if args.list_categories {
                test_runner::list_categories(&args.path);
                0
            } else {
                test_runner::run_tests(&args.path, cli.no_color, &args.category)
            }
        }
    };
    process::exit(code);
}

fn setup_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "tmdl=debug,tmdl_cli=debug",
            _ => "trace",
        })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Renders diagnostics for one source file to stderr.
struct Reporter {
    writer: StandardStream,
    config: term::Config,
}

impl Reporter {
    fn new(no_color: bool) -> Self {
        let color_choice = if no_color {
            ColorChoice::Never
        } else {
            ColorChoice::Auto
        };
        Reporter {
            writer: StandardStream::stderr(color_choice),
            config: term::Config::default(),
        }
    }

    fn emit(&self, path: &Path, document: &Document, diagnostics: &[Diagnostic<usize>]) {
        let mut files = SimpleFiles::new();
        // Diagnostics are built against file id 0, the only file added.
        files.add(path.display().to_string(), document.text().to_string());
        for diagnostic in diagnostics {
            let _ =
                term::emit_to_write_style(&mut self.writer.lock(), &self.config, &files, diagnostic);
        }
    }

    /// Report an edit failure. Returns the exit code.
    fn edit_error(&self, path: &Path, document: Option<&Document>, error: &EditError) -> i32 {
        match document {
            Some(document) => self.emit(path, document, &[error.to_diagnostic(0, document)]),
            None => eprintln!("error[{}]: {}", error.kind(), error),
        }
        1
    }
}

fn scope_for(table: Option<String>) -> Scope {
    match table {
        Some(table) => Scope::Table(table),
        None => Scope::Document,
    }
}

fn read_body(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut body = String::new();
        std::io::stdin()
            .read_to_string(&mut body)
            .context("failed to read body from stdin")?;
        return Ok(body);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read body {}", path.display()))
}

fn do_edit(args: EditArgs, config: &Config, reporter: &Reporter) -> i32 {
    let body = match read_body(&args.body_file) {
        Ok(body) => body,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return 1;
        }
    };

    let original = match read_document(&args.file) {
        Ok(document) => document,
        Err(e) => return reporter.edit_error(&args.file, None, &e),
    };

    let editor = config.editor(args.reindent);
    let policy = config.backup_policy(args.backup);
    let mut request = EditRequest::new(&args.keyword, &args.name, body);
    request.scope = scope_for(args.table);

    let result = if args.dry_run {
        preview(&editor, original.clone(), &request)
    } else {
        apply_to_file(&editor, &args.file, original.clone(), &request, policy)
    };

    let edit = match result {
        Ok(edit) => edit,
        Err(e) => return reporter.edit_error(&args.file, Some(&original), &e),
    };

    let warnings: Vec<_> = edit
        .warnings
        .iter()
        .map(|w| w.to_diagnostic(0, &original))
        .collect();
    reporter.emit(&args.file, &original, &warnings);

    if args.dry_run || edit.original.is_some() {
        print!("{}", edit.diff);
    }
    if edit.written {
        info!(file = %args.file.display(), keyword = %args.keyword, name = %args.name, "edited");
        eprintln!(
            "edited {} '{}' in {}",
            args.keyword,
            args.name,
            args.file.display()
        );
        if let Some(backup) = &edit.backup_path {
            eprintln!("backup: {}", backup.display());
        }
    }
    0
}

fn do_add_partition(args: AddPartitionArgs, config: &Config, reporter: &Reporter) -> i32 {
    let partition = match read_body(&args.source_file) {
        Ok(source) => NewPartition::new(&args.name, source).with_mode(args.write.mode.into()),
        Err(e) => {
            eprintln!("error: {:#}", e);
            return 1;
        }
    };
    let summary = format!("added partition '{}' to table '{}'", args.name, args.table);
    write_declaration(&args.file, &args.write, config, reporter, &summary, |editor, document| {
        editor.add_partition(document, &args.table, &partition)
    })
}

fn do_create_table(args: CreateTableArgs, config: &Config, reporter: &Reporter) -> i32 {
    let name = args.partition.as_deref().unwrap_or(&args.table);
    let partition = match read_body(&args.source_file) {
        Ok(source) => NewPartition::new(name, source).with_mode(args.write.mode.into()),
        Err(e) => {
            eprintln!("error: {:#}", e);
            return 1;
        }
    };
    let summary = format!("created table '{}' with partition '{}'", args.table, name);
    write_declaration(&args.file, &args.write, config, reporter, &summary, |editor, document| {
        editor.create_table(document, &args.table, &partition)
    })
}

/// Read `path`, apply `change` and write the result under the backup policy,
/// or print the diff with `--dry-run`.
fn write_declaration(
    path: &Path,
    args: &WriteArgs,
    config: &Config,
    reporter: &Reporter,
    summary: &str,
    change: impl FnOnce(&Editor, &Document) -> Result<Document, EditError>,
) -> i32 {
    let original = match read_document(path) {
        Ok(document) => document,
        Err(e) => return reporter.edit_error(path, None, &e),
    };

    let editor = config.editor(None);
    let result = change(&editor, &original).and_then(|document| {
        let edit = pending(original.clone(), document);
        if args.dry_run {
            Ok(edit)
        } else {
            persist(path, edit, config.backup_policy(args.backup))
        }
    });
    let edit: FileEdit = match result {
        Ok(edit) => edit,
        Err(e) => return reporter.edit_error(path, Some(&original), &e),
    };

    if args.dry_run || edit.original.is_some() {
        print!("{}", edit.diff);
    }
    if edit.written {
        info!(file = %path.display(), "{}", summary);
        eprintln!("{} in {}", summary, path.display());
        if let Some(backup) = &edit.backup_path {
            eprintln!("backup: {}", backup.display());
        }
    }
    0
}

fn do_extract(args: ExtractArgs, config: &Config, reporter: &Reporter) -> i32 {
    let document = match read_document(&args.file) {
        Ok(document) => document,
        Err(e) => return reporter.edit_error(&args.file, None, &e),
    };

    let editor = config.editor(None);
    match editor.extract(&document, &scope_for(args.table), &args.keyword, &args.name) {
        Ok(body) => {
            println!("{}", body);
            0
        }
        Err(e) => reporter.edit_error(&args.file, Some(&document), &e),
    }
}

fn do_list(args: ListArgs, reporter: &Reporter) -> i32 {
    let document = match read_document(&args.file) {
        Ok(document) => document,
        Err(e) => return reporter.edit_error(&args.file, None, &e),
    };

    fn print_nodes(nodes: &[OutlineNode], indent: usize) {
        for node in nodes {
            let pad = "  ".repeat(indent);
            println!(
                "{}{} '{}' [{}-{}]",
                pad,
                node.keyword,
                node.name,
                node.lines.start + 1,
                node.lines.end
            );
            print_nodes(&node.children, indent + 1);
        }
    }
    let outline = tmdl::parser::outline(&document);
    if outline.is_empty() {
        eprintln!("no objects declared in {}", args.file.display());
        return 0;
    }
    print_nodes(&outline.objects, 0);
    0
}

fn do_lint(args: LintArgs, config: &Config, reporter: &Reporter) -> i32 {
    let document = match read_document(&args.file) {
        Ok(document) => document,
        Err(e) => {
            eprintln!("error[{}]: {}", e.kind(), e);
            return 2;
        }
    };

    let issues = tmdl::lint(&document, &config.lint_options());
    let errors = tmdl::lint::error_count(&issues);
    debug!(file = %args.file.display(), issues = issues.len(), errors, "linted");

    let validation = if args.authoritative {
        match validator::run(config.validator.path.as_deref(), &args.file) {
            Ok(validation) => Some(validation),
            Err(e) => {
                eprintln!("error: {:#}", e);
                return 2;
            }
        }
    } else {
        None
    };
    let report = match &validation {
        Some(Validation::Completed(report)) => Some(report),
        _ => None,
    };
    let validator_failed = report.is_some_and(|r| !r.is_valid);

    if args.json {
        let output = serde_json::json!({
            "file": args.file.display().to_string(),
            "errorCount": errors,
            "issues": issues,
            "validator": report,
        });
        match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("error: {}", e);
                return 2;
            }
        }
    } else {
        let diagnostics: Vec<_> = issues.iter().map(|i| i.to_diagnostic(0, &document)).collect();
        reporter.emit(&args.file, &document, &diagnostics);
        eprintln!(
            "{}: {} issue(s), {} error(s)",
            args.file.display(),
            issues.len(),
            errors
        );
        match &validation {
            Some(Validation::Completed(report)) => eprintln!("validator: {}", report.summary()),
            Some(Validation::Skipped(reason)) => eprintln!("validator skipped: {}", reason),
            None => {}
        }
    }

    if errors > 0 || validator_failed { 1 } else { 0 }
}

fn do_validate(args: ValidateArgs, config: &Config) -> i32 {
    match validator::run(config.validator.path.as_deref(), &args.file) {
        Ok(Validation::Completed(report)) => {
            println!("{}", report.summary());
            if report.is_valid { 0 } else { 1 }
        }
        Ok(Validation::Skipped(reason)) => {
            eprintln!("validator skipped: {}", reason);
            0
        }
        Err(e) => {
            eprintln!("error: {:#}", e);
            2
        }
    }
}
