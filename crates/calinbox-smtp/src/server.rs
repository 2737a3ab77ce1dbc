//! SMTP listener.

use crate::connection::{ServerConfig, Session};
use crate::error::Result;
use crate::handler::MessageHandler;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};

/// Pause after a failed accept, e.g. when out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

enum Event {
    Accepted(io::Result<(TcpStream, SocketAddr)>),
    Finished(std::result::Result<(), JoinError>),
    Shutdown,
}

/// SMTP server accepting connections concurrently, one task per connection.
#[derive(Debug)]
pub struct Server<H> {
    listener: TcpListener,
    config: Arc<ServerConfig>,
    handler: Arc<H>,
}

impl<H: MessageHandler> Server<H> {
    /// Binds the configured host and port.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(config: ServerConfig, handler: H) -> Result<Self> {
        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        Ok(Self {
            listener,
            config: Arc::new(config),
            handler: Arc::new(handler),
        })
    }

    /// Returns the bound address, useful when binding port 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until `shutdown` reads `true` or its sender is
    /// dropped, then stops accepting and waits for live sessions to finish.
    ///
    /// Sessions waiting for a command are told `421` and closed; a message
    /// being handled completes first.
    ///
    /// # Errors
    ///
    /// Returns an error if the local address cannot be read.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        tracing::info!(addr = %self.local_addr()?, hostname = %self.config.hostname, "SMTP server listening");
        let mut connections = JoinSet::new();

        loop {
            let event = tokio::select! {
                accepted = self.listener.accept() => Event::Accepted(accepted),
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    Event::Finished(finished)
                }
                _ = shutdown.wait_for(|stop| *stop) => Event::Shutdown,
            };

            match event {
                Event::Accepted(Ok((socket, peer))) => {
                    tracing::debug!(%peer, "connection accepted");
                    let session = Session::new(socket, Arc::clone(&self.config), Arc::clone(&self.handler))
                        .with_peer(peer)
                        .with_shutdown(shutdown.clone());
                    connections.spawn(serve(session, peer));
                }
                Event::Accepted(Err(e)) => {
                    tracing::warn!(?e, "failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
                Event::Finished(finished) => log_finished(finished),
                Event::Shutdown => break,
            }
        }
        drop(self.listener);

        tracing::info!(remaining = connections.len(), "SMTP server shutting down, draining connections");
        while let Some(finished) = connections.join_next().await {
            log_finished(finished);
        }
        tracing::info!("SMTP server stopped");

        Ok(())
    }
}

async fn serve<H: MessageHandler>(mut session: Session<TcpStream, H>, peer: SocketAddr) {
    match session.run().await {
        Ok(()) => tracing::debug!(%peer, "connection closed"),
        Err(e) => tracing::warn!(%peer, ?e, "connection ended with error"),
    }
}

fn log_finished(finished: std::result::Result<(), JoinError>) {
    if let Err(e) = finished {
        tracing::error!(?e, "connection task failed");
    }
}
