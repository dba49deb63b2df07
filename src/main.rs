//! FlashKV - An In-Memory Data-Structure Server
//!
//! This is the main entry point for the FlashKV server.
//! It sets up the TCP listener, storage engine, and handles incoming connections.

use anyhow::Context;
use clap::Parser;
use flashkv::commands::CommandHandler;
use flashkv::connection::{handle_connection, ConnectionConfig, ConnectionStats};
use flashkv::storage::StorageEngine;
use flashkv::ServerConfig;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn print_banner(config: &ServerConfig) {
    println!(
        r#"
FlashKV v{} - In-Memory Data-Structure Server
──────────────────────────────────────────────
Server started on {}
Ready to accept connections.

Use Ctrl+C to shutdown gracefully.
"#,
        flashkv::VERSION,
        config.bind_address()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();

    // RUST_LOG wins over --log-level
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Create the storage engine (shared across all connections) and its sweeper
    let (storage, sweeper) = StorageEngine::with_sweeper(config.expiry());

    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    info!("Listening on {}", config.bind_address());

    print_banner(&config);

    let shutdown = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received, stopping server..."),
            Err(e) => {
                // Without a signal handler the server runs until killed
                warn!("Unable to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = accept_loop(listener, storage, config.connection(), Arc::clone(&stats)) => {}
        _ = shutdown => {}
    }

    sweeper.shutdown().await;
    info!(
        connections = stats
            .connections_accepted
            .load(std::sync::atomic::Ordering::Relaxed),
        commands = stats
            .commands_processed
            .load(std::sync::atomic::Ordering::Relaxed),
        "Server shutdown complete"
    );
    Ok(())
}

/// Main loop that accepts incoming connections
async fn accept_loop(
    listener: TcpListener,
    storage: Arc<StorageEngine>,
    conn_config: ConnectionConfig,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = CommandHandler::new(Arc::clone(&storage));
                let stats = Arc::clone(&stats);
                let conn_config = conn_config.clone();

                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, conn_config, stats).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
