use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use tether_engine::{Backend, Dispatcher, EngineConfig, FixtureBackend, Gateway, HttpBackend, ResolutionEngine};
use tether_registry::{CatalogStore, load_manifest};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "tether", version, about = "Dependency-aware tool gateway")]
struct Cli {
    #[command(flatten)]
    options: GlobalOptions,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalOptions {
    /// Catalogue manifest (JSON or YAML)
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,
    /// Serve responses from a fixture file instead of calling HTTP backends
    #[arg(long, global = true)]
    fixtures: Option<PathBuf>,
    /// Base URL for operations that do not carry one
    #[arg(long, global = true)]
    base_url: Option<String>,
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
    #[arg(long, global = true)]
    max_response_items: Option<usize>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the MCP server on stdio
    Serve,
    /// Print callable operations and intents
    List,
    /// Call an operation or intent once and print the outcome
    Call {
        operation: String,
        /// Arguments as a JSON object
        #[arg(long)]
        args: Option<String>,
        /// Single argument as key=value; values that parse as JSON keep their type
        #[arg(long = "arg", value_name = "KEY=VALUE")]
        arg: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    let config = apply_overrides(EngineConfig::load()?, &cli.options);
    let manifest_path = cli
        .options
        .manifest
        .clone()
        .unwrap_or_else(|| config.resolved_manifest_path());
    let gateway = Arc::new(build_gateway(&config, &manifest_path, cli.options.fixtures.as_deref())?);

    match cli.command {
        Command::Serve => {
            spawn_reload_on_hangup(Arc::clone(&gateway), manifest_path);
            tether_mcp::serve_stdio(gateway).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::List => {
            println!("{}", serde_json::to_string_pretty(&gateway.list_operations())?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Call { operation, args, arg } => {
            let arguments = parse_arguments(args.as_deref(), &arg)?;
            let outcome = gateway.call(&operation, arguments).await;
            println!("{}", serde_json::to_string_pretty(&outcome.to_value())?);
            Ok(if outcome.ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
    }
}

/// Logs go to stderr so stdout stays reserved for MCP traffic and command output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn apply_overrides(mut config: EngineConfig, options: &GlobalOptions) -> EngineConfig {
    if let Some(base_url) = &options.base_url {
        config.base_url = Some(base_url.clone());
    }
    if let Some(timeout_ms) = options.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    if let Some(max_items) = options.max_response_items {
        config.max_response_items = max_items;
    }
    config
}

fn build_gateway(config: &EngineConfig, manifest_path: &std::path::Path, fixtures: Option<&std::path::Path>) -> Result<Gateway> {
    let manifest = load_manifest(manifest_path)?;
    let store = CatalogStore::from_manifest(manifest).with_context(|| format!("invalid catalogue {}", manifest_path.display()))?;
    let backend: Arc<dyn Backend> = match fixtures {
        Some(path) => Arc::new(FixtureBackend::from_file(path)?),
        None => Arc::new(HttpBackend::new(config.base_url.clone(), config.timeout())),
    };
    info!(
        manifest = %manifest_path.display(),
        fixtures = fixtures.is_some(),
        timeout_ms = config.timeout_ms,
        "gateway ready"
    );
    let engine = ResolutionEngine::new(Dispatcher::new(backend, config.timeout()));
    Ok(Gateway::new(
        Arc::new(store),
        engine,
        config.execution_context(),
        config.max_response_items,
    ))
}

#[cfg(unix)]
fn spawn_reload_on_hangup(gateway: Arc<Gateway>, manifest_path: PathBuf) {
    use tokio::signal::unix::{SignalKind, signal};
    use tracing::{error, warn};

    let mut hangups = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(err) => {
            warn!(error = %err, "SIGHUP reload disabled");
            return;
        }
    };
    tokio::spawn(async move {
        while hangups.recv().await.is_some() {
            let reloaded = load_manifest(&manifest_path).and_then(|manifest| Ok(gateway.reload(manifest)?));
            if let Err(err) = reloaded {
                error!(manifest = %manifest_path.display(), error = %err, "catalogue reload failed");
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_on_hangup(_gateway: Arc<Gateway>, _manifest_path: PathBuf) {}

fn parse_arguments(json: Option<&str>, pairs: &[String]) -> Result<Map<String, Value>> {
    let mut arguments = match json {
        Some(text) => match serde_json::from_str::<Value>(text).context("--args is not valid JSON")? {
            Value::Object(map) => map,
            other => bail!("--args must be a JSON object, got {other}"),
        },
        None => Map::new(),
    };
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            bail!("--arg expects KEY=VALUE, got '{pair}'");
        };
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        arguments.insert(key.trim().to_string(), value);
    }
    Ok(arguments)
}
