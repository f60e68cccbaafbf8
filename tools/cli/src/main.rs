//! EDVault CLI - run and inspect the encrypted data vault server.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use edvault_common::{DocumentId, EdvId};
use edvault_http::ServerConfig;

#[derive(Parser)]
#[command(name = "edvault")]
#[command(about = "EDVault - Encrypted data vault server")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the vault HTTP server.
    Serve {
        /// JSON configuration file.
        #[arg(short, long, env = "EDVAULT_CONFIG")]
        config: Option<PathBuf>,

        /// Address to listen on.
        #[arg(short, long)]
        bind: Option<SocketAddr>,

        /// Public base URI vault ids are built from.
        #[arg(long)]
        base_uri: Option<String>,

        /// Header carrying the caller identity.
        #[arg(long)]
        identity_header: Option<String>,

        /// Treat every request as coming from this identity.
        #[arg(long)]
        fixed_identity: Option<String>,

        /// Print the effective configuration and exit.
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate a fresh identifier.
    GenerateId {
        /// What the identifier is for.
        #[arg(value_enum, default_value = "document")]
        kind: IdKind,

        /// How many identifiers to print.
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum IdKind {
    Vault,
    Document,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Serve {
            config,
            bind,
            base_uri,
            identity_header,
            fixed_identity,
            dry_run,
        } => {
            let mut server = match config {
                Some(path) => ServerConfig::load(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => ServerConfig::default(),
            };
            if let Some(bind) = bind {
                server.bind = bind;
            }
            if let Some(base_uri) = base_uri {
                server.base_uri = base_uri;
            }
            if let Some(header) = identity_header {
                server.identity_header = header;
            }
            if fixed_identity.is_some() {
                server.fixed_identity = fixed_identity;
            }

            if dry_run {
                server.validate().context("Invalid configuration")?;
                println!("{}", serde_json::to_string_pretty(&server)?);
                return Ok(());
            }
            cmd_serve(server).await
        }

        Commands::GenerateId { kind, count } => {
            cmd_generate_id(kind, count);
            Ok(())
        }
    }
}

/// Run the server until interrupted.
async fn cmd_serve(config: ServerConfig) -> Result<()> {
    if let Some(identity) = &config.fixed_identity {
        warn!(identity = %identity, "Every request is treated as this identity");
    }
    info!("Starting vault server on {}", config.bind);

    edvault_http::serve(config, shutdown_signal())
        .await
        .context("Server failed")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

/// Print freshly generated identifiers.
fn cmd_generate_id(kind: IdKind, count: usize) {
    for _ in 0..count {
        match kind {
            IdKind::Vault => println!("{}", EdvId::generate()),
            IdKind::Document => println!("{}", DocumentId::generate()),
        }
    }
}
