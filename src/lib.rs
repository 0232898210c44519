//! # shard-ipc
//!
//! A length-prefixed, JSON-framed duplex protocol that lets one coordinator
//! process talk to many shard processes.
//!
//! ## Layers
//! - [`core`]: packet model and frame codec
//! - [`transport`]: connections over any async byte stream, TCP helpers
//! - [`protocol`]: auth handshake, request correlation, server dispatch
//! - [`service`]: the [`Client`] and [`Server`] roles
//! - [`config`], [`error`], [`utils`]: configuration, errors, logging and metrics
//!
//! ## Example
//! ```no_run
//! use shard_ipc::{log_broadcasts, Client, HandlerRegistry, Packet, Server, ServerConfig};
//!
//! # async fn run() -> shard_ipc::Result<()> {
//! let registry = HandlerRegistry::new(|_conn, packet: Packet| async move {
//!     tracing::warn!(packet = %packet, "No handler for packet");
//!     Ok(())
//! })
//! .with("eval", |conn: std::sync::Arc<shard_ipc::Connection>, packet: Packet| async move {
//!     let mut reply = Packet::new("eval-response").with("result", "2").with("success", true);
//!     reply.id = packet.id.clone();
//!     conn.write_packet(&reply).await
//! });
//!
//! let mut server = Server::new(ServerConfig::default());
//! let addr = server.start(registry).await?;
//!
//! let client = Client::connect(&addr.to_string(), "change-me", log_broadcasts()).await?;
//! let response = client.eval("1 + 1").await?;
//! assert_eq!(response.get_str("result"), Some("2"));
//!
//! client.close().await?;
//! server.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::config::{ClientConfig, NetworkConfig, ServerConfig};
pub use crate::core::packet::{Packet, Value};
pub use crate::error::{ProtocolError, Result};
pub use crate::protocol::{Dispatcher, HandlerRegistry, PacketType};
pub use crate::service::{broadcast_handler, log_broadcasts, Client, ClientState, Server};
pub use crate::transport::{Connection, ConnectionSet};
