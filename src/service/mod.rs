//! # Services
//!
//! The two roles of the protocol.
//!
//! - **Client**: initiator; authenticates, then issues correlated requests and
//!   receives broadcasts over one connection
//! - **Server**: acceptor; authenticates every incoming connection and routes
//!   its packets to application handlers

pub mod client;
pub mod server;

pub use client::{broadcast_handler, log_broadcasts, BroadcastHandler, Client, ClientState};
pub use server::{Server, ShutdownHandle};
