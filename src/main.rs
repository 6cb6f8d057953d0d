use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use ehr_dispatch::{build_session, mcp, BatchOrdering, Config, ToolCallBatch, ToolCallRequest};

/// Tool-call dispatch server for the clinic front-desk agent
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to ~/.ehr-dispatch/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Batch ordering: "context_first" or "concurrent"
    #[arg(long, global = true)]
    ordering: Option<BatchOrdering>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the tool endpoints over HTTP (default)
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Dispatch a single tool call and print the response
    Call {
        /// Operation name, e.g. search_record
        name: String,

        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?.with_env_overrides(),
        None => Config::load_or_default(),
    };
    if let Some(ordering) = args.ordering {
        config.batch_ordering = ordering;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let config = load_config(&args)?;
    info!("FHIR base: {}", config.fhir_base_url);
    info!("Token endpoint: {}", config.token_url);

    let session = build_session(&config).context("Failed to set up dispatch session")?;

    match args.command {
        Some(Command::Call { name, args }) => {
            let args: serde_json::Value =
                serde_json::from_str(&args).context("--args must be a JSON object")?;
            let request = ToolCallRequest::new(name, uuid::Uuid::new_v4().to_string(), args);
            let response = session
                .handle_batch(&ToolCallBatch::from(vec![request.clone()]))
                .await;

            if response.function_responses.is_empty() {
                anyhow::bail!("Unknown tool: {}", request.name);
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Some(Command::Serve { port }) => {
            mcp::start_server(session, port.unwrap_or(config.listen_port)).await?;
        }
        None => {
            mcp::start_server(session, config.listen_port).await?;
        }
    }

    Ok(())
}
