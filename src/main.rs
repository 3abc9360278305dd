//! Purpose: `loadout-bridge` CLI entry point.
//! Role: Binary crate root; parses args, installs logging, runs one command, maps errors.
//! Invariants: stdout carries only command output (JSON array, summary, or keys).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `to_exit_code`.
//! Invariants: Argument errors exit before any file is touched.
#![allow(clippy::result_large_err)]
use std::error::Error as StdError;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod command_dispatch;

use loadout_bridge::core::error::{Error, ErrorKind, to_exit_code};
use loadout_bridge::core::store::DEFAULT_COLLECTION_PATH;

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
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    to_exit_code(ErrorKind::Usage)
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint(clap_error_hint(&err)));
            }
        },
    };

    init_tracing();

    command_dispatch::dispatch_command(cli.command, &cli.collection)
        .map_err(add_corrupt_hint)
        .map_err(add_io_hint)
        .map_err(add_internal_hint)
}

#[derive(Parser)]
#[command(
    name = "loadout-bridge",
    version,
    about = "Export loadout records from a game store to JSON and merge edits back",
    long_about = r#"Export loadout records from a game store to JSON and merge edits back.

The store is a binary document container; the loadout collection inside it is
converted to a JSON array of objects keyed by `key`. Importing replaces the
collection wholesale: records missing from the JSON are dropped."#,
    after_help = r#"EXAMPLES
  $ loadout-bridge export game.store true > loadouts.json
  $ loadout-bridge import game.store loadouts.json
  $ loadout-bridge restore game.store

NOTES
  - Set RUST_LOG=info (or debug) for progress on stderr"#
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        default_value = DEFAULT_COLLECTION_PATH,
        help = "Document path of the loadout collection inside the store"
    )]
    collection: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Print the loadout collection as a JSON array",
        after_help = r#"EXAMPLES
  $ loadout-bridge export game.store true     # list fields as JSON arrays
  $ loadout-bridge export game.store false    # list fields as raw strings"#
    )]
    Export {
        #[arg(help = "Store file", value_hint = ValueHint::FilePath)]
        store: PathBuf,
        #[arg(
            value_name = "ARRAYS",
            action = ArgAction::Set,
            value_parser = clap::value_parser!(bool),
            help = "Render list fields as JSON arrays: true|false"
        )]
        arrays: bool,
    },
    #[command(
        about = "Merge a JSON array back into the store",
        after_help = r#"NOTES
  - Records are matched by `key`; unknown keys create new records
  - Records absent from the JSON are removed from the store
  - The first import saves <STORE>.backup (never overwritten)"#
    )]
    Import {
        #[arg(help = "Store file", value_hint = ValueHint::FilePath)]
        store: PathBuf,
        #[arg(help = "JSON file to import", value_hint = ValueHint::FilePath)]
        json_file: PathBuf,
        #[arg(long, help = "Skip creating <STORE>.backup before the first write")]
        no_backup: bool,
    },
    #[command(about = "Replace the store with its .backup copy")]
    Restore {
        #[arg(help = "Store file", value_hint = ValueHint::FilePath)]
        store: PathBuf,
    },
    #[command(about = "Print record keys, one per line")]
    Keys {
        #[arg(help = "Store file", value_hint = ValueHint::FilePath)]
        store: PathBuf,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn add_io_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::Permission => {
            err.with_hint("Permission denied. Check that the store and its directory are writable.")
        }
        ErrorKind::Busy => err.with_hint(
            "Another import holds the store lock. Wait for it to finish, then retry.",
        ),
        ErrorKind::Io => err.with_hint("I/O error. Check the path, filesystem, and disk space."),
        _ => err,
    }
}

fn add_corrupt_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Corrupt || err.hint().is_some() {
        return err;
    }
    err.with_hint("Store could not be decoded. Run `loadout-bridge restore` if a backup exists.")
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Retry with RUST_BACKTRACE=1 and share command/context if it persists.",
    )
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
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::Parse => "malformed json".to_string(),
        ErrorKind::Schema => "record does not match schema".to_string(),
        ErrorKind::Busy => "resource is busy".to_string(),
        ErrorKind::Permission => "permission denied".to_string(),
        ErrorKind::Corrupt => "corrupt data".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
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
    if let Some(offset) = err.offset() {
        inner.insert("offset".to_string(), json!(offset));
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
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(path) = err.path() {
        lines.push(format!("path: {}", path.display()));
    }
    if let Some(offset) = err.offset() {
        lines.push(format!("offset: {offset}"));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);
    let Some(usage) = usage else {
        return "Try `loadout-bridge --help`.".to_string();
    };

    let tokens: Vec<&str> = usage.split_whitespace().collect();
    let Some(pos) = tokens.iter().position(|t| *t == "loadout-bridge") else {
        return "Try `loadout-bridge --help`.".to_string();
    };
    let parts: Vec<&str> = tokens
        .iter()
        .skip(pos + 1)
        .take_while(|token| {
            !token.starts_with('-') && !token.starts_with('<') && !token.starts_with('[')
        })
        .copied()
        .collect();
    if parts.is_empty() {
        return "Try `loadout-bridge --help`.".to_string();
    }
    format!("Try `loadout-bridge {} --help`.", parts.join(" "))
}
