//! TCP stream provider for clients and servers.

use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tracing::{info, instrument};

use crate::error::{ProtocolError, Result};
use crate::transport::connection::Connection;
use crate::utils::timeout::with_timeout_error;

/// Open a TCP connection to the coordinator, bounded by `timeout`.
#[instrument(skip(timeout))]
pub async fn connect(addr: &str, timeout: Duration) -> Result<Connection> {
    let stream = with_timeout_error(
        async { TcpStream::connect(addr).await.map_err(ProtocolError::Io) },
        timeout,
    )
    .await?;
    info!(peer = addr, "Connected");
    Ok(Connection::from_tcp(stream))
}

/// Bind a listener for incoming peer connections.
#[instrument]
pub async fn bind(addr: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    info!(address = %listener.local_addr()?, "Listening");
    Ok(listener)
}
