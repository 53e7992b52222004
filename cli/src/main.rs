// ringline: call-signaling relay daemon
//
// Binds a WebSocket listener, maintains presence in the configured store,
// and relays call negotiation between connected endpoints.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use ringline_core::{
    FcmNotifier, KeywordFilter, MemoryPresenceStore, NullNotifier, PresenceStore, PushNotifier,
    RelayConfig, RelayServer, SledPresenceStore,
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "ringline")]
#[command(about = "Ringline: WebRTC call-signaling relay", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the signaling relay
    Start {
        /// Listen port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
        /// Presence store path (overrides config)
        #[arg(short, long)]
        store: Option<String>,
    },
    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Scan a line of text against the configured keyword list
    Keywords { input: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    Set { key: String, value: String },
    Get { key: String },
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { port, store } => cmd_start(port, store).await,
        Commands::Config { action } => cmd_config(action),
        Commands::Keywords { input } => cmd_keywords(&input),
    }
}

async fn cmd_start(port: Option<u16>, store_path: Option<String>) -> Result<()> {
    let config = config::Config::load()?;
    let port = port.unwrap_or(config.listen_port);
    let store_path = store_path.or_else(|| config.storage_path.clone());

    println!("{}", "Ringline relay starting...".bold());

    let store: Arc<dyn PresenceStore> = match &store_path {
        Some(path) => {
            println!("{} Presence store: {}", "✓".green(), path);
            Arc::new(
                SledPresenceStore::open(path)
                    .with_context(|| format!("Failed to open presence store at {}", path))?,
            )
        }
        None => {
            println!(
                "{} Presence store: in-memory (set storage_path for durability)",
                "✓".green()
            );
            Arc::new(MemoryPresenceStore::new())
        }
    };

    let notifier: Arc<dyn PushNotifier> =
        match (&config.push.endpoint, &config.push.server_key) {
            (Some(endpoint), Some(key)) => {
                println!("{} Push wakeups: {}", "✓".green(), endpoint);
                Arc::new(FcmNotifier::new(endpoint.clone(), key.clone()))
            }
            _ => {
                println!(
                    "{} Push wakeups: disabled (set push.endpoint and push.server_key)",
                    "✓".green()
                );
                Arc::new(NullNotifier)
            }
        };

    let relay_config = RelayConfig {
        bind: format!("0.0.0.0:{}", port)
            .parse()
            .context("Invalid listen port")?,
        keywords: config.keywords.clone(),
    };
    let bound = RelayServer::new(relay_config, store, notifier)
        .bind()
        .await
        .context("Failed to bind relay listener")?;

    println!(
        "{} Listening on {}",
        "✓".green(),
        bound.local_addr().to_string().bright_cyan()
    );
    println!();

    tokio::select! {
        _ = bound.run() => {}
        _ = tokio::signal::ctrl_c() => {
            println!("\n{}", "Shutting down".bold());
        }
    }

    Ok(())
}

fn cmd_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Set { key, value } => {
            let mut config = config::Config::load()?;
            config.set(&key, &value)?;
            println!("{} {} = {}", "✓".green(), key, value);
        }
        ConfigAction::Get { key } => {
            let config = config::Config::load()?;
            println!("{}", config.get(&key)?);
        }
        ConfigAction::List => {
            let config = config::Config::load()?;
            println!("listen_port = {}", config.listen_port);
            println!(
                "storage_path = {}",
                config.storage_path.clone().unwrap_or_default()
            );
            println!("keywords = {}", config.keywords.join(", "));
            println!(
                "push.endpoint = {}",
                config.push.endpoint.clone().unwrap_or_default()
            );
            println!(
                "push.server_key = {}",
                if config.push.server_key.is_some() {
                    "<set>"
                } else {
                    ""
                }
            );
        }
    }
    Ok(())
}

fn cmd_keywords(input: &str) -> Result<()> {
    let config = config::Config::load()?;
    let filter = KeywordFilter::new(&config.keywords);
    let scan = filter.scan(input).context("Scan failed")?;
    if scan.matched {
        println!(
            "{} matched: {}",
            "✓".green(),
            scan.found.join(", ").bright_cyan()
        );
    } else {
        println!("no matches");
    }
    Ok(())
}
