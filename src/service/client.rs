use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{ClientConfig, CLIENT_ID_PREFIX};
use crate::core::packet::{Packet, Value};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::correlator::Correlator;
use crate::protocol::handshake::{client_auth_request, client_auth_verify};
use crate::protocol::packet_type::PacketType;
use crate::transport::connection::Connection;
use crate::transport::tcp;

pub type BroadcastFuture = BoxFuture<'static, Result<()>>;

/// Callback for packets that did not answer a pending request.
pub type BroadcastHandler = Arc<dyn Fn(Packet) -> BroadcastFuture + Send + Sync + 'static>;

/// Wrap an async closure as a [`BroadcastHandler`].
pub fn broadcast_handler<F, Fut>(handler: F) -> BroadcastHandler
where
    F: Fn(Packet) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |packet: Packet| handler(packet).boxed())
}

/// A broadcast handler that only logs what it receives.
pub fn log_broadcasts() -> BroadcastHandler {
    broadcast_handler(|packet: Packet| async move {
        debug!(packet = %packet, "Unhandled broadcast");
        Ok(())
    })
}

/// Client-side connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connecting,
    Authenticated,
    Closed,
}

/// Initiator side of the protocol: an authenticated connection offering
/// request/response calls plus a feed of unsolicited packets.
///
/// `request` may be called concurrently from many tasks; each call gets its own
/// correlation id and is completed by whichever response carries that id.
pub struct Client {
    connection: Arc<Connection>,
    correlator: Arc<Correlator>,
    read_task: JoinHandle<()>,
    state: watch::Receiver<ClientState>,
    state_tx: Arc<watch::Sender<ClientState>>,
}

impl Client {
    /// Connect over TCP and authenticate with `credential`.
    #[instrument(skip(credential, on_broadcast))]
    pub async fn connect(
        addr: &str,
        credential: &str,
        on_broadcast: BroadcastHandler,
    ) -> Result<Self> {
        let connection = tcp::connect(addr, ClientConfig::default().connection_timeout).await?;
        Self::handshake(connection, credential, on_broadcast).await
    }

    /// Connect using the address, credential and timeout from `config`.
    pub async fn from_config(config: &ClientConfig, on_broadcast: BroadcastHandler) -> Result<Self> {
        let connection = tcp::connect(&config.address, config.connection_timeout).await?;
        Self::handshake(connection, &config.auth, on_broadcast).await
    }

    /// Authenticate over an already established stream.
    pub async fn with_stream<S>(
        stream: S,
        credential: &str,
        on_broadcast: BroadcastHandler,
    ) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::handshake(Connection::new(stream), credential, on_broadcast).await
    }

    async fn handshake(
        connection: Connection,
        credential: &str,
        on_broadcast: BroadcastHandler,
    ) -> Result<Self> {
        let (state_tx, state) = watch::channel(ClientState::Disconnected);
        let state_tx = Arc::new(state_tx);
        state_tx.send_replace(ClientState::Connecting);

        let connection = Arc::new(connection);
        let correlator = Arc::new(Correlator::new(CLIENT_ID_PREFIX));

        // The receive loop must be running before the auth request goes out,
        // since it is what delivers the response
        let read_task = tokio::spawn(receive_loop(
            connection.clone(),
            correlator.clone(),
            on_broadcast,
            state_tx.clone(),
        ));

        let client = Self {
            connection,
            correlator,
            read_task,
            state,
            state_tx,
        };

        // A server that drops us before answering (e.g. at its connection
        // limit) ends the receive loop without ever completing the request
        let mut state_rx = client.state.clone();
        let verdict = tokio::select! {
            biased;
            response = client.request(client_auth_request(credential)) => {
                response.and_then(|response| client_auth_verify(&response))
            }
            _ = state_rx.wait_for(|state| *state == ClientState::Closed) => {
                Err(ProtocolError::ConnectionClosed)
            }
        };

        if let Err(e) = verdict {
            warn!(error = %e, "Authentication failed");
            client.read_task.abort();
            client.connection.close().await;
            client.state_tx.send_replace(ClientState::Closed);
            return Err(e);
        }

        client.state_tx.send_replace(ClientState::Authenticated);
        info!(connection_id = client.connection.id(), "Client authenticated");
        Ok(client)
    }

    pub fn state(&self) -> ClientState {
        *self.state.borrow()
    }

    /// Watch state transitions, e.g. to notice the receive loop ending.
    pub fn subscribe_state(&self) -> watch::Receiver<ClientState> {
        self.state.clone()
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Ids of requests still awaiting a response.
    pub fn pending_requests(&self) -> Vec<String> {
        self.correlator.pending_ids()
    }

    /// Write a packet without waiting for any response.
    pub async fn send(&self, packet: &Packet) -> Result<()> {
        self.connection.write_packet(packet).await
    }

    /// Send `packet` with a fresh correlation id and wait for the response
    /// carrying the same id.
    ///
    /// There is no timeout: if the peer never answers, neither does this call.
    /// Use [`Client::request_with_timeout`] for a bounded wait.
    pub async fn request(&self, packet: Packet) -> Result<Packet> {
        let (id, rx) = self.issue(packet).await?;
        let response = rx.await.map_err(|_| {
            debug!(request_id = %id, "Pending request dropped");
            ProtocolError::Custom(constants::ERR_RESPONSE_DROPPED.to_string())
        })?;
        Ok(response)
    }

    /// Like [`Client::request`], but give up after `timeout` and drop the
    /// pending record.
    pub async fn request_with_timeout(&self, packet: Packet, timeout: Duration) -> Result<Packet> {
        let (id, rx) = self.issue(packet).await?;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(ProtocolError::Custom(
                constants::ERR_RESPONSE_DROPPED.to_string(),
            )),
            Err(_) => {
                self.correlator.forget(&id);
                debug!(request_id = %id, "Request timed out");
                Err(ProtocolError::Timeout)
            }
        }
    }

    async fn issue(
        &self,
        mut packet: Packet,
    ) -> Result<(String, tokio::sync::oneshot::Receiver<Packet>)> {
        let id = self.correlator.next_id();
        packet.id = Some(id.clone());

        let rx = self.correlator.register(&id)?;
        if let Err(e) = self.connection.write_packet(&packet).await {
            self.correlator.forget(&id);
            return Err(e);
        }
        Ok((id, rx))
    }

    /// Ask the coordinator to relay `packet` to every connected peer.
    pub async fn broadcast(&self, packet: Packet) -> Result<Packet> {
        self.request(Packet::new(PacketType::BroadcastRequest).with("packet", Value::from(packet)))
            .await
    }

    /// Ask the coordinator to evaluate an expression.
    pub async fn eval(&self, code: &str) -> Result<Packet> {
        self.request(Packet::new(PacketType::Eval).with("code", code)).await
    }

    /// Ask the coordinator to execute a block of code.
    pub async fn exec(&self, code: &str) -> Result<Packet> {
        self.request(Packet::new(PacketType::Exec).with("code", code)).await
    }

    /// Stop the receive loop, tell the server we are leaving, and close the stream.
    pub async fn close(&self) -> Result<()> {
        self.read_task.abort();

        let result = self.connection.write_packet(&Packet::new(PacketType::Disconnect)).await;
        self.connection.close().await;
        self.state_tx.send_replace(ClientState::Closed);
        result
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.read_task.abort();
    }
}

/// Read packets for the lifetime of the connection, completing pending
/// requests and spawning the broadcast handler for everything else.
async fn receive_loop(
    connection: Arc<Connection>,
    correlator: Arc<Correlator>,
    on_broadcast: BroadcastHandler,
    state: Arc<watch::Sender<ClientState>>,
) {
    loop {
        let packet = match connection.read_packet().await {
            Ok(packet) => packet,
            Err(e) => {
                if matches!(e, ProtocolError::ConnectionClosed) {
                    info!(connection_id = connection.id(), "Server closed the connection");
                } else {
                    error!(connection_id = connection.id(), error = %e, "Receive loop failed");
                }
                break;
            }
        };

        match correlator.resolve(packet) {
            Ok(None) => {}
            Ok(Some(unmatched)) => {
                let handler = on_broadcast.clone();
                tokio::spawn(async move {
                    let packet_type = unmatched.packet_type.clone();
                    if let Err(e) = handler(unmatched).await {
                        warn!(packet_type = %packet_type, error = %e, "Broadcast handler failed");
                    }
                });
            }
            Err(e) => {
                error!(error = %e, "Failed to route incoming packet");
                break;
            }
        }
    }

    state.send_replace(ClientState::Closed);
}
