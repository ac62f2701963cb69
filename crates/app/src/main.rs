use std::fmt;
use std::io::IsTerminal;
use std::sync::Arc;

use services::{
    BootstrapError, EngineConfig, ProgressStore, ProgressStoreError, StaticCourses, TutorEngine,
    builtin_courses, drive,
};
use storage::repository::Storage;
use thiserror::Error;
use tracing::info;

mod console;
mod logging;
mod render;

use console::StdIo;
use render::TerminalRenderer;

const DEFAULT_DB_URL: &str = "sqlite://tutor.sqlite3";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidMaxAttempts { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidMaxAttempts { raw } => {
                write!(f, "invalid --max-attempts value: {raw}")
            }
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Args(#[from] ArgsError),
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error(transparent)]
    Progress(#[from] ProgressStoreError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("unknown subcommand: {0}")]
    UnknownCommand(String),
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  tutor [run]     [--db <sqlite_url> | --memory] [--max-attempts <n>] [--plain]");
    eprintln!("  tutor reset-all [--db <sqlite_url> | --memory]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db {DEFAULT_DB_URL}");
    eprintln!("  --max-attempts 3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  TUTOR_DB_URL, TUTOR_MAX_ATTEMPTS, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    ResetAll,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "run" => Some(Self::Run),
            "reset-all" => Some(Self::ResetAll),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Database {
    Sqlite(String),
    Memory,
}

#[derive(Debug)]
struct Args {
    database: Database,
    max_attempts: u32,
    ansi: bool,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut database = Database::Sqlite(
            std::env::var("TUTOR_DB_URL")
                .ok()
                .map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url),
        );
        let mut max_attempts = match std::env::var("TUTOR_MAX_ATTEMPTS") {
            Ok(raw) => parse_max_attempts(raw)?,
            Err(_) => EngineConfig::default().max_attempts(),
        };
        let mut ansi = std::io::stdout().is_terminal();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    database = Database::Sqlite(normalize_sqlite_url(value));
                }
                "--memory" => database = Database::Memory,
                "--max-attempts" => {
                    max_attempts = parse_max_attempts(require_value(args, "--max-attempts")?)?;
                }
                "--plain" => ansi = false,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            database,
            max_attempts,
            ansi,
        })
    }
}

fn parse_max_attempts(raw: String) -> Result<u32, ArgsError> {
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ArgsError::InvalidMaxAttempts { raw }),
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), AppError> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let invalid = || ArgsError::InvalidDbUrl {
        raw: db_url.to_string(),
    };
    let path = db_url.strip_prefix("sqlite://").ok_or_else(invalid)?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(invalid().into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

async fn open_storage(database: &Database) -> Result<Storage, AppError> {
    match database {
        Database::Memory => Ok(Storage::in_memory()),
        Database::Sqlite(url) => {
            prepare_sqlite_file(url)?;
            let storage = Storage::sqlite(url)
                .await
                .map_err(BootstrapError::from)?;
            info!(url = %url, "progress database ready");
            Ok(storage)
        }
    }
}

async fn run() -> Result<(), AppError> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Run,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Run,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            print_usage();
            AppError::UnknownCommand(first.to_owned())
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let parsed = Args::parse(&mut argv.into_iter()).inspect_err(|_| print_usage())?;
    let storage = open_storage(&parsed.database).await?;
    let store = ProgressStore::from_storage(&storage);

    match cmd {
        Command::ResetAll => {
            let removed = store.delete_all().await?;
            println!("Deleted {removed} progress record(s).");
            Ok(())
        }
        Command::Run => {
            let courses = StaticCourses::new(builtin_courses().map_err(BootstrapError::from)?);
            let engine = TutorEngine::new(&courses, store)
                .with_config(EngineConfig::new(parsed.max_attempts))
                .with_renderer(Arc::new(TerminalRenderer::new(parsed.ansi)));
            let mut io = StdIo::new();
            drive(&engine, &mut io).await?;
            Ok(())
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    logging::init();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
