//! # Transport Layer
//!
//! Byte-stream plumbing underneath the protocol.
//!
//! - **Connection**: framed packet I/O over any `AsyncRead + AsyncWrite` stream
//! - **TCP**: connect/bind helpers producing connections and listeners

pub mod connection;
pub mod tcp;

pub use connection::{Connection, ConnectionSet};
