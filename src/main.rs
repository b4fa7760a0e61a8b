//! Binary entry point for the tsfamix CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Index a project dump and print entity counts
//! tsfamix --project project.json
//!
//! # Index, then apply a batch of file changes
//! tsfamix --project project.json --changes changes.json
//!
//! # Index a directory of per-file arenas, skipping tests
//! tsfamix --project arenas/ --exclude '**/*.spec.ts'
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use tsfamix::cli::{resolve_config, run_index};
use tsfamix::config::CliOverrides;
use tsfamix::error::{FamixError, OutputErrorCode};
use tsfamix::output::{emit_response, ErrorResponse};

// ============================================================================
// CLI Structure
// ============================================================================

/// Incremental TypeScript code model indexer.
///
/// Reads parsed TypeScript files, builds the Famix entity graph and prints a
/// JSON summary of it.
#[derive(Parser, Debug)]
#[command(name = "tsfamix", version, about = "Incremental TypeScript code model indexer")]
struct Cli {
    /// Project dump (JSON list of parsed files) or directory of `*.arena.json` files.
    #[arg(long)]
    project: PathBuf,

    /// Change set to apply after the full run.
    #[arg(long)]
    changes: Option<PathBuf>,

    /// Only index files matching this glob (repeatable).
    #[arg(long = "include", value_name = "GLOB")]
    include: Vec<String>,

    /// Skip files matching this glob (repeatable).
    #[arg(long = "exclude", value_name = "GLOB")]
    exclude: Vec<String>,

    /// Do not create Comment entities.
    #[arg(long)]
    no_comments: bool,

    /// Log level for tracing output (RUST_LOG takes precedence).
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            include_patterns: self.include.clone(),
            exclude_patterns: self.exclude.clone(),
            comments: self.no_comments.then_some(false),
            log_level: self.log_level.map(|l| l.as_str().to_string()),
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let error_code = OutputErrorCode::from(&err);
            let _ = emit_response(&ErrorResponse::new(&err), &mut io::stdout());
            let _ = io::stdout().flush();
            ExitCode::from(error_code.code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(directive: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn execute(cli: Cli) -> Result<(), FamixError> {
    let overrides = cli.overrides();
    let config = resolve_config(&cli.project, &overrides)?;
    init_tracing(&config.log_level.value);

    let response = run_index(&cli.project, cli.changes.as_deref(), config)?;
    emit_response(&response, &mut io::stdout())
        .map_err(|e| FamixError::internal(format!("failed to write output: {e}")))
}
