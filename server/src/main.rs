//! dictserve binary — thin CLI shell over the [`dictserve_server`] library.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use dictserve_core::catalog::Paths;
use dictserve_core::Engine;
use dictserve_server::{build_router, AppContext};

// ---------------------------------------------------------------------------
// CLI definition (clap derive)
// ---------------------------------------------------------------------------

/// Self-hosted dictionary server over MDX, StarDict, and DSL dictionaries.
#[derive(Parser)]
#[command(name = "dictserve", version, about, long_about = None)]
struct Cli {
    /// App resources directory (default: ~/.dictserve)
    #[arg(long)]
    resources: Option<PathBuf>,

    /// Resource cache directory (default: ~/.cache/dictserve)
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Listening address, overriding preferences.yaml
    #[arg(long)]
    listen: Option<String>,

    /// Listening port, overriding preferences.yaml
    #[arg(long)]
    port: Option<u16>,

    /// Scan the source directories for new dictionaries before serving
    #[arg(long)]
    scan: bool,
}

// ---------------------------------------------------------------------------
// Graceful shutdown signal
// ---------------------------------------------------------------------------

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received SIGINT, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl+C");
        info!("Received Ctrl+C, shutting down...");
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dictserve=info".parse().unwrap()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let defaults = Paths::from_home();
    let paths = Paths::new(
        cli.resources.unwrap_or(defaults.resources_root),
        cli.cache.unwrap_or(defaults.cache_root),
    );

    let engine = match Engine::open(paths) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            error!(error = %e, "failed to initialise the engine");
            std::process::exit(1);
        }
    };

    if cli.scan {
        let added = engine.scan_sources();
        info!(added, "source scan finished");
    }

    let (address, port) = {
        let settings = engine.settings.lock().unwrap();
        (
            cli.listen.unwrap_or_else(|| settings.preferences.listening_address.clone()),
            cli.port.unwrap_or(settings.preferences.port),
        )
    };

    let app = build_router(AppContext { engine, start_time: std::time::Instant::now() });

    let listener = match tokio::net::TcpListener::bind(format!("{address}:{port}")).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(address = address.as_str(), port, error = %e, "could not bind");
            std::process::exit(1);
        }
    };
    info!(port, "http://{address}:{port}");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.unwrap();
}
