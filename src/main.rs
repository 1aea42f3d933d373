//! dbm-cache - command line entry point
//!
//! `set` reads a JSON message, stores its value and prints the stored value
//! as JSON. Any failure, or a stored `null`, exits non-zero. `get`, `list` and `clean` are
//! diagnostics over the same named stores.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dbm_cache::commands::{clean_command, get_command, list_command, resolve_store, set_command};
use dbm_cache::{spawn_cleanup_task, Config, DbmCache};

#[derive(Parser)]
#[command(name = "dbm-cache", version, about = "File-backed TTL cache")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store `value` under `key` in the store named by `filename`
    Set {
        /// JSON object with `filename`, `key`, `value` and optional `expiry_secs`
        message: String,
        /// Workflow context as JSON (validated, otherwise unused)
        context: String,
    },
    /// Print the value stored under KEY; exits 1 on a miss
    Get { filename: String, key: String },
    /// Print every entry of a store, including expired ones not yet cleaned
    List {
        filename: String,
        /// Skip decoding values
        #[arg(long)]
        keys_only: bool,
    },
    /// Remove expired entries
    Clean {
        filename: String,
        /// Remove entries expiring before this Unix timestamp (default: now)
        #[arg(long)]
        older_than: Option<u64>,
        /// Reclaim free space after the sweep
        #[arg(long)]
        compact: bool,
        /// Keep running, cleaning every SECS seconds until interrupted
        #[arg(long, value_name = "SECS")]
        every: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries only command output.
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dbm_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match run(cli.cmd, &config).await {
        Ok(code) => code,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cmd: Command, config: &Config) -> anyhow::Result<ExitCode> {
    let cache = DbmCache::from_config(config);

    match cmd {
        Command::Set { message, context } => {
            let stored = set_command(&cache, config, &message, &context).await?;
            if stored.is_null() {
                warn!("stored value is null");
                return Ok(ExitCode::FAILURE);
            }
            println!("{}", serde_json::to_string(&stored)?);
        }
        Command::Get { filename, key } => {
            match get_command(&cache, config, &filename, &key).await {
                Ok(value) => println!("{}", serde_json::to_string(&value)?),
                Err(err) if err.is_not_found() => {
                    warn!("{}", err);
                    return Ok(ExitCode::FAILURE);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Command::List { filename, keys_only } => {
            for item in list_command(&cache, config, &filename, keys_only).await? {
                println!("{}", serde_json::to_string(&item)?);
            }
        }
        Command::Clean {
            filename,
            older_than,
            compact,
            every: None,
        } => {
            let report = clean_command(&cache, config, &filename, older_than, compact).await?;
            println!("{}", serde_json::to_string(&report)?);
        }
        Command::Clean {
            filename,
            compact,
            every: Some(secs),
            ..
        } => {
            let path = resolve_store(config, &filename)?;
            let interval = if secs > 0 { secs } else { config.cleanup_interval };
            let handle = spawn_cleanup_task(cache.clone(), path, interval, compact);
            shutdown_signal().await;
            handle.abort();
            info!("cleanup task stopped, stats: {:?}", cache.stats());
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}
