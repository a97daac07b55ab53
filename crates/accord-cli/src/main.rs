// crates/accord-cli/src/main.rs
// ============================================================================
// Module: Accord CLI Entry Point
// Description: Command dispatcher for contract publishing and inspection.
// Purpose: Publish recorded contracts to a broker and summarize contract files.
// Dependencies: accord-broker, accord-config, accord-core, clap, serde, thiserror
// ============================================================================

//! ## Overview
//! `accord publish` uploads every `*_contracts.json` file in a directory to
//! the configured broker under one consumer and version. `accord inspect`
//! prints the unique workflows of a contract file as JSON lines.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use accord_broker::ContractPublisher;
use accord_config::BrokerConfig;
use accord_core::ContractDocument;
use accord_core::EventSink;
use accord_core::FileSink;
use accord_core::JsonConverter;
use accord_core::NoopSink;
use accord_core::unique_workflows;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Directory scanned for contract files when `--dir` is absent.
const DEFAULT_CONTRACT_DIR: &str = "target/accord";

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "accord", version, disable_help_subcommand = true)]
struct Cli {
    /// Append structured events to this JSON-lines file.
    #[arg(long, value_name = "PATH", global = true)]
    event_log: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Publish recorded contract files to the broker.
    Publish(PublishCommand),
    /// Print the unique workflows of a contract file.
    Inspect(InspectCommand),
}

/// Arguments for `publish`.
#[derive(Args, Debug)]
struct PublishCommand {
    /// Consumer name the contracts are published under.
    #[arg(long)]
    consumer: String,
    /// Consumer version; a `-SNAPSHOT` suffix is dropped.
    #[arg(long)]
    version: String,
    /// Directory holding `*_contracts.json` files.
    #[arg(long, value_name = "DIR", default_value = DEFAULT_CONTRACT_DIR)]
    dir: PathBuf,
    /// Broker URL; defaults to the configured publish URL.
    #[arg(long, value_name = "URL")]
    url: Option<String>,
    /// Broker configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for `inspect`.
#[derive(Args, Debug)]
struct InspectCommand {
    /// Contract file to summarize.
    #[arg(value_name = "FILE")]
    file: PathBuf,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let sink = event_sink(cli.event_log.as_deref())?;
    match cli.command {
        Commands::Publish(command) => command_publish(&command, sink),
        Commands::Inspect(command) => command_inspect(&command, sink.as_ref()),
    }
}

/// Opens the event sink selected by `--event-log`.
fn event_sink(path: Option<&Path>) -> CliResult<Arc<dyn EventSink>> {
    match path {
        None => Ok(Arc::new(NoopSink)),
        Some(path) => FileSink::new(path)
            .map(|sink| Arc::new(sink) as Arc<dyn EventSink>)
            .map_err(|err| CliError::new(format!("cannot open event log {}: {err}", path.display()))),
    }
}

// ============================================================================
// SECTION: Publish Command
// ============================================================================

/// Executes the `publish` command.
fn command_publish(command: &PublishCommand, sink: Arc<dyn EventSink>) -> CliResult<ExitCode> {
    let url = publish_url(command, |name| env::var(name).ok())?;
    let publisher = ContractPublisher::new(url)
        .map_err(|err| CliError::new(err.to_string()))?
        .with_sink(sink);
    let published = publisher
        .publish_directory(&command.consumer, &command.version, &command.dir)
        .map_err(|err| CliError::new(err.to_string()))?;
    if published.is_empty() {
        write_stdout_line(&format!("no contract files found in {}", command.dir.display()))?;
    }
    for provider in published {
        write_stdout_line(&format!("published {provider} for {}", command.consumer))?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Picks `--url` or the configured publish URL.
fn publish_url(
    command: &PublishCommand,
    lookup: impl Fn(&str) -> Option<String>,
) -> CliResult<String> {
    if let Some(url) = &command.url {
        return Ok(url.trim_end_matches('/').to_string());
    }
    let config = BrokerConfig::load_from(lookup, command.config.as_deref())
        .map_err(|err| CliError::new(err.to_string()))?;
    config.publish_url().map(str::to_string).map_err(|err| CliError::new(err.to_string()))
}

// ============================================================================
// SECTION: Inspect Command
// ============================================================================

/// One output line of `inspect`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkflowSummary<'a> {
    /// Workflow id.
    id: &'a str,
    /// Provider state descriptions in order.
    provider_states: Vec<&'a str>,
    /// Number of recorded interactions.
    interactions: usize,
}

/// Executes the `inspect` command.
fn command_inspect(command: &InspectCommand, sink: &dyn EventSink) -> CliResult<ExitCode> {
    let document = ContractDocument::load(&command.file, &JsonConverter::new())
        .map_err(|err| CliError::new(err.to_string()))?;
    for line in inspect_lines(&document, sink)? {
        write_stdout_line(&line)?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Renders one JSON line per unique workflow.
fn inspect_lines(document: &ContractDocument, sink: &dyn EventSink) -> CliResult<Vec<String>> {
    unique_workflows(document, sink)
        .into_iter()
        .map(|workflow| {
            let summary = WorkflowSummary {
                id: &workflow.id,
                provider_states: workflow
                    .provider_states
                    .iter()
                    .map(|state| state.description.as_str())
                    .collect(),
                interactions: workflow.interactions.len(),
            };
            serde_json::to_string(&summary).map_err(|err| CliError::new(err.to_string()))
        })
        .collect()
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}").map_err(|err| CliError::new(format!("stdout write failed: {err}")))
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
