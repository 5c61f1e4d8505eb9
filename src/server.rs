//! TCP listener for the chat relay.
//!
//! Accepts incoming connections and hands each one to the connection handler
//! on its own task. All connections share one session registry.

use crate::config::Config;
use crate::connection::handle_connection;
use crate::names::NameGenerator;
use crate::registry::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, Instrument};

/// Server instance
pub struct Server {
    config: Config,
    registry: Arc<Registry>,
    names: Arc<dyn NameGenerator>,
}

/// A server that is accepting connections
pub struct RunningServer {
    local_addr: SocketAddr,
    registry: Arc<Registry>,
    stop_tx: oneshot::Sender<()>,
    accept_task: JoinHandle<()>,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config, names: Arc<dyn NameGenerator>) -> Self {
        Server {
            config,
            registry: Registry::new(),
            names,
        }
    }

    /// Bind the listener and begin accepting connections
    pub async fn start(&self) -> std::io::Result<RunningServer> {
        let listener = TcpListener::bind(self.config.listen_addr()).await?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "Server is up on PORT {}", local_addr.port());

        let (stop_tx, stop_rx) = oneshot::channel();
        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.registry),
            Arc::clone(&self.names),
            Arc::new(Semaphore::new(self.config.max_connections)),
            stop_rx,
        ));

        Ok(RunningServer {
            local_addr,
            registry: Arc::clone(&self.registry),
            stop_tx,
            accept_task,
        })
    }
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting new connections. Existing sessions are left running.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(());
        if let Err(e) = self.accept_task.await {
            error!(error = %e, "Accept loop ended abnormally");
        }
        info!(sessions = self.registry.len(), "Server is offline");
    }
}

async fn accept_loop(
    listener: TcpListener,
    registry: Arc<Registry>,
    names: Arc<dyn NameGenerator>,
    connection_limit: Arc<Semaphore>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    loop {
        // Wait for a connection slot
        let permit = tokio::select! {
            _ = &mut stop_rx => break,
            permit = Arc::clone(&connection_limit).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let accepted = tokio::select! {
            _ = &mut stop_rx => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, addr)) => {
                debug!(peer = %addr, "New connection");

                let registry = Arc::clone(&registry);
                let names = Arc::clone(&names);
                let span = info_span!("connection", peer = %addr);

                tokio::spawn(
                    async move {
                        handle_connection(stream, registry, names).await;
                        drop(permit);
                    }
                    .instrument(span),
                );
            }
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
            }
        }
    }

    debug!("Accept loop stopped");
}
