use crate::core::packet::Packet;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::handshake::{server_auth_response, verify_credential};
use crate::protocol::packet_type::PacketType;
use crate::transport::connection::{Connection, ConnectionSet};
use crate::utils::metrics::Metrics;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::borrow::Cow;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Registry key of the handler used for packet types nobody registered
pub const MISSING_PACKET: &str = PacketType::MissingPacket.as_str();

pub type HandlerFuture = BoxFuture<'static, Result<()>>;
pub type HandlerFn = dyn Fn(Arc<Connection>, Packet) -> HandlerFuture + Send + Sync + 'static;

/// Server-side state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    AwaitingAuth,
    Authenticated,
    Closed,
}

/// Packet handlers keyed by packet type, with a mandatory fallback.
pub struct HandlerRegistry {
    handlers: HashMap<Cow<'static, str>, Arc<HandlerFn>>,
    fallback: Arc<HandlerFn>,
}

fn boxed<F, Fut>(handler: F) -> Arc<HandlerFn>
where
    F: Fn(Arc<Connection>, Packet) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |conn: Arc<Connection>, packet: Packet| handler(conn, packet).boxed())
}

impl HandlerRegistry {
    /// Create a registry whose `missing-packet` handler is `fallback`.
    pub fn new<F, Fut>(fallback: F) -> Self
    where
        F: Fn(Arc<Connection>, Packet) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            handlers: HashMap::new(),
            fallback: boxed(fallback),
        }
    }

    /// Build from a map that must contain a `missing-packet` entry.
    pub fn from_handlers(mut handlers: HashMap<String, Arc<HandlerFn>>) -> Result<Self> {
        let fallback = handlers.remove(MISSING_PACKET).ok_or_else(|| {
            ProtocolError::ConfigError(constants::ERR_MISSING_DEFAULT_HANDLER.to_string())
        })?;

        Ok(Self {
            handlers: handlers
                .into_iter()
                .map(|(k, v)| (Cow::Owned(k), v))
                .collect(),
            fallback,
        })
    }

    /// Wrap a closure into the shape stored by the registry.
    pub fn handler<F, Fut>(handler: F) -> Arc<HandlerFn>
    where
        F: Fn(Arc<Connection>, Packet) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        boxed(handler)
    }

    /// Register a handler for `packet_type`. Registering `missing-packet`
    /// replaces the fallback.
    pub fn register<F, Fut>(&mut self, packet_type: impl Into<Cow<'static, str>>, handler: F)
    where
        F: Fn(Arc<Connection>, Packet) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let packet_type = packet_type.into();
        if packet_type == MISSING_PACKET {
            self.fallback = boxed(handler);
        } else {
            self.handlers.insert(packet_type, boxed(handler));
        }
    }

    /// Builder-style `register`.
    pub fn with<F, Fut>(mut self, packet_type: impl Into<Cow<'static, str>>, handler: F) -> Self
    where
        F: Fn(Arc<Connection>, Packet) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.register(packet_type, handler);
        self
    }

    pub fn contains(&self, packet_type: &str) -> bool {
        self.handlers.contains_key(packet_type)
    }

    fn resolve(&self, packet_type: &str) -> Arc<HandlerFn> {
        self.handlers
            .get(packet_type)
            .unwrap_or(&self.fallback)
            .clone()
    }
}

/// Per-connection authentication gate and packet router.
///
/// The secret and registry are fixed at construction, so separate dispatchers
/// (e.g. one per test) never share handlers.
#[derive(Clone)]
pub struct Dispatcher {
    secret: Arc<str>,
    registry: Arc<HandlerRegistry>,
    connections: Arc<ConnectionSet>,
    metrics: Arc<Metrics>,
}

impl Dispatcher {
    pub fn new(secret: impl Into<Arc<str>>, registry: HandlerRegistry) -> Self {
        Self::with_shared(
            secret,
            Arc::new(registry),
            Arc::new(ConnectionSet::new()),
            Arc::new(Metrics::new()),
        )
    }

    pub fn with_shared(
        secret: impl Into<Arc<str>>,
        registry: Arc<HandlerRegistry>,
        connections: Arc<ConnectionSet>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            secret: secret.into(),
            registry,
            connections,
            metrics,
        }
    }

    pub fn connections(&self) -> &Arc<ConnectionSet> {
        &self.connections
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Drive one connection from `AwaitingAuth` to `Closed`.
    ///
    /// The connection is registered in the active set for the duration of the
    /// call, and closed and removed on every exit path. Returns the error that
    /// ended the connection, if any; a `disconnect` packet or a refused
    /// handshake end it cleanly.
    #[instrument(skip(self, conn), fields(connection_id = conn.id(), peer = ?conn.peer_addr()))]
    pub async fn run(&self, conn: Arc<Connection>) -> Result<()> {
        self.connections.insert(conn.clone());
        let result = self.drive(&conn).await;

        self.connections.remove(conn.id());
        conn.close().await;

        if let Err(e) = &result {
            if e.is_fatal() {
                self.metrics.protocol_error();
            }
            debug!(error = %e, "Connection ended");
        }
        result
    }

    async fn drive(&self, conn: &Arc<Connection>) -> Result<()> {
        let mut state = ConnectionState::AwaitingAuth;

        while state != ConnectionState::Closed {
            let packet = conn.read_packet().await?;
            state = match state {
                ConnectionState::AwaitingAuth => self.authenticate(conn, &packet).await?,
                ConnectionState::Authenticated => self.route(conn, packet),
                ConnectionState::Closed => ConnectionState::Closed,
            };
        }

        Ok(())
    }

    async fn authenticate(&self, conn: &Connection, packet: &Packet) -> Result<ConnectionState> {
        let accepted = verify_credential(packet, &self.secret);
        conn.write_packet(&server_auth_response(packet, accepted)).await?;

        if accepted {
            self.metrics.auth_succeeded();
            info!("Connection authenticated");
            Ok(ConnectionState::Authenticated)
        } else {
            self.metrics.auth_rejected();
            warn!("Connection failed authentication");
            Ok(ConnectionState::Closed)
        }
    }

    fn route(&self, conn: &Arc<Connection>, packet: Packet) -> ConnectionState {
        if packet.is_type(PacketType::Disconnect.as_str()) {
            self.connections.remove(conn.id());
            info!("Peer disconnected");
            return ConnectionState::Closed;
        }

        self.spawn_handler(conn.clone(), packet);
        ConnectionState::Authenticated
    }

    /// Run the handler for `packet` as a detached task. The dispatch loop never
    /// waits on it; errors and panics stay inside the task.
    fn spawn_handler(&self, conn: Arc<Connection>, packet: Packet) {
        let handler = self.registry.resolve(&packet.packet_type);
        let metrics = self.metrics.clone();
        let connection_id = conn.id();
        let packet_type = packet.packet_type.clone();

        metrics.packet_dispatched();
        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(async move { handler(conn, packet).await })
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    metrics.handler_failed();
                    warn!(connection_id, packet_type = %packet_type, error = %e, "Packet handler failed");
                }
                Err(_) => {
                    metrics.handler_failed();
                    error!(connection_id, packet_type = %packet_type, "Packet handler panicked");
                }
            }
        });
    }
}
