//! `calinbox` - SMTP listener that ingests calendar invitations.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;

use anyhow::Context;
use calinbox_smtp::Server;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "calinbox=info,calinbox_core=info,calinbox_smtp=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = cli::Args::parse().into_config()?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        backend = %config.backend_url,
        recipient_pattern = config.recipient_pattern.as_deref().unwrap_or("*"),
        "Starting calinbox"
    );

    let ingest = config.ingest()?;
    let server = Server::bind(config.server.clone(), ingest)
        .await
        .with_context(|| format!("failed to bind {}:{}", config.server.host, config.server.port))?;

    let (stop, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown requested, finishing open sessions");
        let _ = stop.send(true);
    });

    server.run(shutdown).await?;
    info!("calinbox stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
                return;
            }
            Err(e) => tracing::warn!(?e, "cannot listen for SIGTERM"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(?e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
