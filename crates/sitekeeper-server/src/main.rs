//! `SiteKeeper` server entry point.
//!
//! Loads configuration, prepares the upload root, and starts the Axum admin
//! API with graceful shutdown.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

use sitekeeper_server::config::ServerConfig;
use sitekeeper_server::routes;
use sitekeeper_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment.
    let config = ServerConfig::from_env();

    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    info!(
        base_dir = %config.base_upload_dir.display(),
        template_dir = %config.template_dir.display(),
        protocol = %config.protocol,
        "SiteKeeper starting"
    );

    tokio::fs::create_dir_all(&config.base_upload_dir)
        .await
        .with_context(|| {
            format!(
                "failed to create upload directory {}",
                config.base_upload_dir.display()
            )
        })?;

    if !config.template_dir.is_dir() {
        warn!(
            template_dir = %config.template_dir.display(),
            "template directory missing, provisioning will fail until it exists"
        );
    }

    if !config.admin_dir.is_dir() {
        warn!(
            admin_dir = %config.admin_dir.display(),
            "admin frontend directory missing, /admin will return 404"
        );
    }

    let state = Arc::new(AppState::from_config(&config));
    let app = routes::build_router(state);

    // Bind and serve.
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "SiteKeeper server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("SiteKeeper server stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received, stopping server");
}
