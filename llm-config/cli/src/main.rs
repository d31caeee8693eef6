mod prompt;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use llm_config_lib::{
    ConfigError, CredentialFlow, CredentialStore, Endpoint, FlowConfig, FlowError, FlowOptions,
    HttpTransport, JsonFileStore, MemoryStore, ResolvedCredentials, TransportError,
};
use owo_colors::{OwoColorize, Stream};
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::prompt::TerminalPresenter;

/// Exit status when the user dismisses the prompt.
const EXIT_CANCELLED: u8 = 130;

/// Configure and validate credentials for an OpenAI-compatible API.
///
/// Uses the saved base URL and API key when they still work. Otherwise asks
/// for new ones, checks them against the service's /models endpoint and
/// saves them.
///
/// Examples:
///   llm-config                                   # Saved credentials, or prompt
///   llm-config --force                           # Always prompt
///   llm-config --endpoint Ollama=http://localhost:11434/v1 --endpoint OpenAI=https://api.openai.com/v1
///   llm-config --json | jq -r .baseUrl
#[derive(Debug, Parser)]
#[command(name = "llm-config")]
#[command(version)]
#[command(about = "Configure and validate credentials for an OpenAI-compatible API")]
struct Cli {
    /// Storage key the credentials are saved under.
    #[arg(long, value_name = "KEY")]
    key: Option<String>,

    /// Credential file [default: ~/.config/llm-config/credentials.json].
    #[arg(long, env = "LLM_CONFIG_STORE", value_name = "PATH")]
    store: Option<PathBuf>,

    /// Keep credentials in memory only. Nothing is read from or written to disk.
    #[arg(long)]
    memory: bool,

    /// Always prompt, pre-filled with any saved credentials.
    #[arg(short, long, visible_alias = "show")]
    force: bool,

    /// Base URL to suggest in the prompt (repeatable).
    #[arg(long = "base-url", value_name = "URL")]
    base_urls: Vec<String>,

    /// Offer a fixed endpoint choice instead of free text (repeatable).
    #[arg(long = "endpoint", value_name = "NAME=URL", value_parser = parse_endpoint)]
    endpoints: Vec<Endpoint>,

    /// JSON or YAML file with flow options. Flags take precedence.
    #[arg(long, value_name = "PATH")]
    options: Option<PathBuf>,

    /// Seconds to wait for the service before giving up.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Print the resolved configuration as JSON.
    #[arg(long)]
    json: bool,

    /// Enable debug logging on stderr.
    #[arg(long)]
    debug: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error("failed to build HTTP client: {0}")]
    Transport(#[from] TransportError),

    #[error("terminal error: {0}")]
    Terminal(#[from] inquire::InquireError),

    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    fn exit_status(&self) -> u8 {
        match self {
            Self::Flow(e) if e.is_cancelled() => EXIT_CANCELLED,
            _ => 1,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let result = run(&cli)
        .await
        .and_then(|resolved| print_resolved(&resolved, cli.json));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if matches!(&e, CliError::Flow(f) if f.is_cancelled()) {
                eprintln!("{e}");
            } else {
                eprintln!(
                    "{} {e}",
                    "error:".if_supports_color(Stream::Stderr, |t| t.red())
                );
            }
            ExitCode::from(e.exit_status())
        }
    }
}

/// Logs to stderr. `RUST_LOG` applies unless `--debug` is given.
fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Parses `NAME=URL` into an [`Endpoint`].
fn parse_endpoint(s: &str) -> Result<Endpoint, String> {
    let (name, url) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=URL, got {s:?}"))?;
    let (name, url) = (name.trim(), url.trim());
    if name.is_empty() || url.is_empty() {
        return Err(format!("expected NAME=URL, got {s:?}"));
    }
    Ok(Endpoint::new(name, url))
}

/// Loads the options file, if any, and lays the explicit flags over it.
fn build_options(cli: &Cli) -> Result<FlowOptions, ConfigError> {
    let mut options = match &cli.options {
        Some(path) => FlowOptions::from_path(path)?,
        None => FlowOptions::default(),
    };

    if let Some(key) = &cli.key {
        options.key = Some(key.clone());
    }
    if !cli.base_urls.is_empty() {
        options.default_base_urls = Some(cli.base_urls.clone());
    }
    if !cli.endpoints.is_empty() {
        options.endpoints = Some(cli.endpoints.clone());
    }
    if cli.force {
        options.force_prompt = Some(true);
    }

    Ok(options)
}

fn build_transport(cli: &Cli) -> Result<HttpTransport, TransportError> {
    let mut builder = HttpTransport::builder();
    if let Some(secs) = cli.timeout {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder.build()
}

async fn run(cli: &Cli) -> Result<ResolvedCredentials, CliError> {
    let config = FlowConfig::from_options(build_options(cli)?)?;
    let transport = build_transport(cli)?;

    if cli.memory {
        debug!("Using in-memory credential store");
        return resolve(config, MemoryStore::new(), transport).await;
    }

    let store = cli
        .store
        .clone()
        .map(JsonFileStore::new)
        .unwrap_or_else(JsonFileStore::default_path);
    debug!("Using credential file {}", store.path().display());
    resolve(config, store, transport).await
}

async fn resolve<S: CredentialStore>(
    config: FlowConfig,
    store: S,
    transport: HttpTransport,
) -> Result<ResolvedCredentials, CliError> {
    let flow = CredentialFlow::new(config, store, transport);
    let mut presenter = TerminalPresenter::new();
    let result = flow.run(&mut presenter).await;

    // A broken terminal surfaces as a cancelled prompt; report the real cause.
    if let Some(failure) = presenter.take_failure() {
        return Err(failure.into());
    }
    Ok(result?)
}

fn print_resolved(resolved: &ResolvedCredentials, json: bool) -> Result<(), CliError> {
    if json {
        println!("{}", serde_json::to_string_pretty(resolved)?);
        return Ok(());
    }

    println!(
        "{} {}",
        "Base URL:".if_supports_color(Stream::Stdout, |t| t.bold()),
        resolved.base_url
    );
    println!(
        "{} ({})",
        "Models".if_supports_color(Stream::Stdout, |t| t.bold()),
        resolved.models.len()
    );
    for model in &resolved.models {
        println!("  {model}");
    }
    Ok(())
}
