//! Purpose: `pbvalidate` CLI entry point.
//! Role: Binary crate root; parses args, compiles the schema, validates one document.
//! Invariants: Success output goes to stdout (human or JSON via `--json`).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.

use std::error::Error as StdError;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::{Parser, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

use pbvalidate::api::{Error, ErrorKind, Validator, to_exit_code};

#[derive(Parser)]
#[command(
    name = "pbvalidate",
    version,
    about = "Validate a JSON document against a protobuf message definition"
)]
struct Cli {
    #[arg(short = 'f', long = "file", help = "Root .proto schema file")]
    schema: PathBuf,

    #[arg(
        short = 'I',
        long = "import-path",
        help = "Import search root; repeatable, earlier roots win"
    )]
    import_paths: Vec<PathBuf>,

    #[arg(
        short = 'm',
        long = "message",
        help = "Fully-qualified message name (e.g. pkg.Envelope)"
    )]
    message: String,

    #[arg(help = "JSON document to validate; '-' reads stdin")]
    document: PathBuf,

    #[arg(long, help = "Emit a JSON validation report on stdout")]
    json: bool,
}

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                return Ok(RunOutcome::with_code(0));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Run `pbvalidate --help` for usage."));
            }
        },
    };

    let document = read_document(&cli.document)?;
    let validator = Validator::compile(&cli.schema, &cli.import_paths).map_err(add_schema_hint)?;
    let (_, report) = validator.validate_document(&cli.message, &cli.document, &document)?;

    if cli.json {
        let json = serde_json::to_string(&report).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode report")
                .with_source(err)
        })?;
        println!("{json}");
    } else {
        println!(
            "valid: {} conforms to `{}` ({} schema file{} parsed)",
            cli.document.display(),
            report.message,
            report.files_parsed,
            if report.files_parsed == 1 { "" } else { "s" }
        );
    }
    Ok(RunOutcome::ok())
}

fn read_document(path: &PathBuf) -> Result<String, Error> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read document from stdin")
                .with_source(err)
        })?;
        return Ok(text);
    }
    std::fs::read_to_string(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read JSON document")
            .with_path(path)
            .with_source(err)
    })
}

/// Flag spellings belong to the CLI, so the flag-aware hint for schema
/// resolution failures is attached here rather than in the resolver.
fn add_schema_hint(err: Error) -> Error {
    if err.kind() == ErrorKind::Io && err.hint().is_none() {
        return err
            .with_hint("Check the -f path, or pass -I so the schema resolves against an import root.");
    }
    err
}

/// First line of a clap error, without the trailing usage block.
fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let first = rendered.lines().next().unwrap_or("invalid arguments");
    first.trim_start_matches("error: ").to_string()
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    format!("{:?} error", err.kind())
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(line) = err.line() {
        inner.insert("line".to_string(), json!(line));
    }
    if let Some(column) = err.column() {
        inner.insert("column".to_string(), json!(column));
    }
    if let Some(field_path) = err.field_path() {
        inner.insert("field".to_string(), json!(field_path));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = Vec::new();
    lines.push(format!("error: {}", error_message(err)));
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(path) = err.path() {
        let mut location = format!("path: {}", path.display());
        if let (Some(line), Some(column)) = (err.line(), err.column()) {
            location.push_str(&format!(":{line}:{column}"));
        }
        lines.push(location);
    }
    if let Some(field_path) = err.field_path() {
        lines.push(format!("field: {field_path}"));
    }
    for cause in error_causes(err) {
        lines.push(format!("cause: {cause}"));
    }
    lines.join("\n")
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}
