//! bucketdav - WebDAV server over a flat, key-addressed object store

use bucketdav::api::build_router;
use bucketdav::api::handlers::AppState;
use bucketdav::config::{BackendConfig, Config};
use bucketdav::storage::build_store;
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// bucketdav - WebDAV over an object store
#[derive(Parser, Debug)]
#[command(name = "bucketdav")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Listen address (overrides config)
    #[arg(short, long, value_name = "ADDR")]
    listen: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration from file if specified, otherwise use default loading
    let mut config = if let Some(ref path) = cli.config {
        Config::from_file(path)?
    } else {
        Config::load()
    };

    let log_level = if cli.verbose {
        "bucketdav=trace,tower_http=trace".to_string()
    } else {
        config.log_level.clone()
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Some(ref addr) = cli.listen {
        config.listen_addr = addr.parse()?;
    }

    info!("Starting bucketdav {}", env!("CARGO_PKG_VERSION"));
    info!("  Listen address: {}", config.listen_addr);
    match &config.backend {
        BackendConfig::Memory { page_size } => {
            info!("  Backend: Memory (page size {})", page_size);
            warn!("  Memory backend is ephemeral; everything is lost on shutdown");
        }
        BackendConfig::Filesystem { path } => {
            info!("  Backend: Filesystem");
            info!("  Data directory: {:?}", path);
        }
        BackendConfig::S3 {
            endpoint,
            bucket,
            region,
            ..
        } => {
            info!("  Backend: S3");
            info!("  Bucket: {}", bucket);
            info!("  Region: {}", region);
            if let Some(ep) = endpoint {
                info!("  Endpoint: {}", ep);
            }
        }
    }
    info!(
        "  Max object size: {} MB",
        config.max_object_size / 1024 / 1024
    );
    match config.copy_concurrency {
        Some(n) => info!("  Copy concurrency: {}", n),
        None => info!("  Copy concurrency: unbounded"),
    }
    if config.auth_enabled() {
        info!("  Basic auth: enabled");
    } else {
        if config.username.is_some() || config.password.is_some() {
            warn!("  Only one of username/password is set; Basic auth stays disabled");
        }
        warn!("  Basic auth: DISABLED, the share is open to anyone who can reach it");
    }

    let store = build_store(&config.backend).await?;
    let state = Arc::new(AppState {
        store,
        max_object_size: config.max_object_size,
        copy_concurrency: config.copy_concurrency,
    });
    let app = build_router(state, &config);

    // Start server with graceful shutdown
    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!("bucketdav listening on http://{}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Handle shutdown signals (SIGINT, SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
