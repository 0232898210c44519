use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ServerConfig;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::dispatcher::{Dispatcher, HandlerRegistry};
use crate::transport::connection::{Connection, ConnectionSet};
use crate::transport::tcp;
use crate::utils::metrics::Metrics;

/// Pause after an accept error that is not specific to one peer
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Acceptor side of the protocol.
///
/// Runs one [`Dispatcher`] state machine per accepted connection, each in its
/// own task. Closing the server stops accepting and drops the listener;
/// connections and handler tasks already running are left to finish on their
/// own.
pub struct Server {
    config: ServerConfig,
    connections: Arc<ConnectionSet>,
    metrics: Arc<Metrics>,
    local_addr: Option<SocketAddr>,
    accept_task: Option<JoinHandle<()>>,
    shutdown: Arc<watch::Sender<bool>>,
}

/// Stops a running server's accept loop from another task.
#[derive(Clone)]
pub struct ShutdownHandle {
    shutdown: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            connections: Arc::new(ConnectionSet::new()),
            metrics: Arc::new(Metrics::new()),
            local_addr: None,
            accept_task: None,
            shutdown: Arc::new(watch::channel(false).0),
        }
    }

    /// Active connections. Handlers can capture this to relay broadcasts.
    pub fn connections(&self) -> Arc<ConnectionSet> {
        self.connections.clone()
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Handle for closing the accept loop while another task sits in [`Server::serve`].
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            shutdown: self.shutdown.clone(),
        }
    }

    /// Address the listener is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Bind the configured address and start accepting connections.
    #[instrument(skip(self, registry), fields(address = %self.config.address))]
    pub async fn start(&mut self, registry: HandlerRegistry) -> Result<SocketAddr> {
        if self.accept_task.is_some() {
            return Err(ProtocolError::Custom(
                constants::ERR_SERVER_ALREADY_STARTED.to_string(),
            ));
        }

        let listener = tcp::bind(&self.config.address).await?;
        let local_addr = listener.local_addr()?;

        let dispatcher = Dispatcher::with_shared(
            self.config.auth_secret.as_str(),
            Arc::new(registry),
            self.connections.clone(),
            self.metrics.clone(),
        );

        self.shutdown.send_replace(false);
        let shutdown_rx = self.shutdown.subscribe();
        self.accept_task = Some(tokio::spawn(accept_loop(
            listener,
            dispatcher,
            self.config.max_connections,
            shutdown_rx,
        )));
        self.local_addr = Some(local_addr);

        Ok(local_addr)
    }

    /// Wait until the accept loop stops.
    pub async fn serve(&mut self) -> Result<()> {
        let task = self.accept_task.take().ok_or_else(|| {
            ProtocolError::Custom(constants::ERR_SERVER_NOT_STARTED.to_string())
        })?;

        if let Err(e) = task.await {
            if !e.is_cancelled() {
                error!(error = %e, "Accept loop terminated abnormally");
            }
        }
        Ok(())
    }

    /// Stop accepting connections and release the listener.
    pub async fn close(&mut self) -> Result<()> {
        self.shutdown.send_replace(true);

        if let Some(mut task) = self.accept_task.take() {
            let grace = self.config.shutdown_timeout;
            if tokio::time::timeout(grace, &mut task).await.is_err() {
                warn!("Accept loop did not stop in time, aborting");
                task.abort();
            }
        }

        self.metrics.log_metrics();
        info!("Server closed");
        Ok(())
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    dispatcher: Dispatcher,
    max_connections: usize,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = async { shutdown_rx.wait_for(|stop| *stop).await.map(|_| ()) } => {
                info!("Shutting down accept loop");
                break;
            }

            accept_result = listener.accept() => {
                let (stream, peer) = match accept_result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!(error = %e, "Error accepting connection");
                        if let Some(delay) = accept_retry_delay(&e) {
                            tokio::time::sleep(delay).await;
                        }
                        continue;
                    }
                };

                if dispatcher.connections().len() >= max_connections {
                    dispatcher.metrics().connection_rejected();
                    warn!(peer = %peer, max_connections, "Connection limit reached, refusing peer");
                    drop(stream);
                    continue;
                }

                let connection = Arc::new(Connection::from_tcp(stream));
                // Registered before spawning so a burst of accepts respects the limit
                dispatcher.connections().insert(connection.clone());
                let dispatcher = dispatcher.clone();
                debug!(peer = %peer, connection_id = connection.id(), "Accepted connection");

                tokio::spawn(async move {
                    dispatcher.metrics().connection_established();
                    let _ = dispatcher.run(connection).await;
                    dispatcher.metrics().connection_closed();
                });
            }
        }
    }

    // Dropping the listener here closes the socket
    drop(listener);
}

/// How long to wait before accepting again after `error`.
///
/// Errors tied to a single peer that hung up during the handshake are retried
/// at once. Anything else (e.g. running out of file descriptors) would fail
/// again immediately, so the loop backs off.
fn accept_retry_delay(error: &io::Error) -> Option<Duration> {
    match error.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted => None,
        _ => Some(ACCEPT_ERROR_BACKOFF),
    }
}
