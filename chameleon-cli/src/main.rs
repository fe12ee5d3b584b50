//! The `chameleon` binary: one-shot Claude invocations from the terminal.

mod errors;
mod progress;

use anyhow::Context;
use chameleon_claude::routing::{self, RouteSlot};
use chameleon_claude::{
    ClaudeClient, ClientConfig, Feature, InvocationHandle, InvocationRequest, StreamSinks,
};
use clap::{Parser, Subcommand};
use errors::CliError;
use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the claude executable (otherwise discovered)
    #[arg(long, global = true)]
    claude_bin: Option<PathBuf>,

    /// Router config file (default: ~/.claude-code-router/config.json)
    #[arg(long, global = true)]
    router_config: Option<PathBuf>,

    /// API key used for GLM models
    #[arg(long, global = true, env = "CHAMELEON_GLM_API_KEY", hide_env_values = true)]
    glm_api_key: Option<String>,

    /// Model used when a request names none
    #[arg(long, global = true)]
    default_model: Option<String>,

    /// Log at info level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sends one prompt and prints the answer
    Send {
        /// Prompt text (read from --file or stdin when omitted)
        prompt: Option<String>,
        /// Read the prompt from this file
        #[arg(long, conflicts_with = "prompt")]
        file: Option<PathBuf>,
        /// Model for this request
        #[arg(long)]
        model: Option<String>,
        /// Working directory for the CLI
        #[arg(long)]
        cwd: Option<PathBuf>,
        /// Session id to pass through
        #[arg(long)]
        session_id: Option<String>,
        /// Kill the CLI after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
        /// Suppress progress lines
        #[arg(short, long)]
        quiet: bool,
    },
    /// Probes the claude executable and reports its capabilities
    Doctor,
    /// Shows which provider a model would be routed to
    Route {
        /// Model to route (default: the configured default model)
        #[arg(long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = client_config(&cli);
    match cli.command {
        Commands::Send {
            prompt,
            file,
            model,
            cwd,
            session_id,
            timeout_secs,
            json,
            quiet,
        } => {
            let prompt = read_prompt(prompt, file.as_deref())?;
            let mut request = InvocationRequest::new(prompt);
            request.model = model;
            request.working_dir = cwd;
            request.session_id = session_id;
            let mut config = config;
            if let Some(secs) = timeout_secs {
                config.timeout = Duration::from_secs(secs);
            }
            run_send(config, &request, json, quiet).await?;
        }
        Commands::Doctor => run_doctor(config).await?,
        Commands::Route { model } => run_route(&config, model.as_deref()).await,
    }

    Ok(())
}

fn client_config(cli: &Cli) -> ClientConfig {
    let mut config = ClientConfig {
        binary_path: cli.claude_bin.clone(),
        router_config_path: cli.router_config.clone(),
        glm_api_key: cli.glm_api_key.clone(),
        ..ClientConfig::default()
    };
    if let Some(model) = &cli.default_model {
        config.default_model.clone_from(model);
    }
    config
}

fn read_prompt(prompt: Option<String>, file: Option<&std::path::Path>) -> Result<String, CliError> {
    if let Some(prompt) = prompt {
        return Ok(prompt);
    }
    if let Some(path) = file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read prompt file {}", path.display()))
            .map_err(CliError::from);
    }
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Err(CliError::MissingPrompt);
    }
    let mut prompt = String::new();
    stdin.lock().read_to_string(&mut prompt)?;
    if prompt.trim().is_empty() {
        return Err(CliError::MissingPrompt);
    }
    Ok(prompt)
}

async fn run_send(
    config: ClientConfig,
    request: &InvocationRequest,
    json: bool,
    quiet: bool,
) -> Result<(), CliError> {
    let client = ClaudeClient::new(config)?;
    let handle = InvocationHandle::new();

    let interrupt = {
        let handle = handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, cancelling invocation");
                handle.cancel();
            }
        })
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if quiet {
                continue;
            }
            for note in progress::describe(&event) {
                eprintln!("{note}");
            }
        }
    });

    let outcome = client
        .execute(request, StreamSinks::events(tx), &handle)
        .await;
    interrupt.abort();
    // The sender is dropped with the run, so the printer drains and stops.
    let _ = printer.await;

    let result = outcome?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.content);
    }
    Ok(())
}

async fn run_doctor(config: ClientConfig) -> Result<(), CliError> {
    let client = ClaudeClient::new(config)?;
    let report = client.probe().await?;
    println!("executable: {}", report.program.display());
    println!("version:    {}", report.version);
    for feature in [
        Feature::StreamJson,
        Feature::Verbose,
        Feature::SkipPermissions,
        Feature::SessionId,
        Feature::Model,
    ] {
        let mark = if report.capabilities.supports(feature) { "ok" } else { "missing" };
        println!("  {feature:?}: {mark}");
    }
    Ok(())
}

async fn run_route(config: &ClientConfig, model: Option<&str>) {
    let model = model.unwrap_or(config.default_model.as_str());
    let route = routing::select_route(model, config).await;
    println!("model:     {model}");
    println!("provider:  {}", route.provider.label());
    println!("base url:  {}", route.base_url);
    println!("no_proxy:  {}", if route.no_proxy.is_empty() { "-" } else { route.no_proxy.as_str() });
    println!(
        "token:     {}",
        if route.auth_token.is_some() { "found" } else { "not found" }
    );

    let Some(path) = config
        .router_config_path
        .clone()
        .or_else(routing::default_router_config_path)
    else {
        return;
    };
    let Some(router) = routing::read_router_config(&path).await else {
        return;
    };
    println!("router slots ({}):", path.display());
    for (name, slot) in [
        ("default", RouteSlot::Default),
        ("background", RouteSlot::Background),
        ("think", RouteSlot::Think),
        ("longContext", RouteSlot::LongContext),
        ("webSearch", RouteSlot::WebSearch),
        ("image", RouteSlot::Image),
        ("video", RouteSlot::Video),
    ] {
        println!("  {name}: {}", router.model_for(slot, &config.default_model));
    }
}
