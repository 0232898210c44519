//! # Error Types
//!
//! Error handling for the shard IPC protocol.
//!
//! This module defines every error that can surface from the frame codec, a
//! connection, the client correlator, or the server dispatcher.
//!
//! ## Error Categories
//! - **Transport errors**: stream closed or truncated mid-frame, undecodable payloads.
//!   These are fatal for the connection they occur on and nothing else.
//! - **Size errors**: an outgoing frame exceeds the wire limit. Raised before any
//!   bytes are written, so the connection stays usable.
//! - **Auth errors**: credential mismatch during the handshake.
//! - **Local errors**: configuration, timeouts, handler failures.
//!
//! ## Example Usage
//! ```rust
//! use shard_ipc::error::{ProtocolError, Result};
//!
//! fn check_len(len: usize) -> Result<()> {
//!     if len > shard_ipc::config::MAX_FRAME_SIZE {
//!         return Err(ProtocolError::OversizedPacket(len));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_len(10).is_ok());
//! assert!(!check_len(70_000).unwrap_err().is_fatal());
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Framing errors
    pub const ERR_TRUNCATED_FRAME: &str = "Stream closed in the middle of a frame";
    pub const ERR_OVERSIZED_PREFIX: &str = "Length prefix exceeds maximum payload size";

    /// Decode errors
    pub const ERR_NOT_AN_OBJECT: &str = "Packet payload is not a JSON object";
    pub const ERR_MISSING_TYPE: &str = "Packet is missing a string \"type\" field";
    pub const ERR_INVALID_ID: &str = "Packet \"id\" field must be a string";
    pub const ERR_INVALID_AUTH: &str = "Packet \"auth\" field must be a string";

    /// Synchronization errors
    pub const ERR_LOCK_POISONED: &str = "Synchronization primitive poisoned";

    /// Handler registry errors
    pub const ERR_MISSING_DEFAULT_HANDLER: &str =
        "Handler registry requires a \"missing-packet\" handler";

    /// Client lifecycle errors
    pub const ERR_RESPONSE_DROPPED: &str = "Pending request was dropped before a response arrived";
    pub const ERR_SERVER_NOT_STARTED: &str = "Server has not been started";
    pub const ERR_SERVER_ALREADY_STARTED: &str = "Server is already running";
}

/// ProtocolError is the primary error type for all protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Framing error: {0}")]
    Framing(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Authorization rejected by peer")]
    AuthFailed,

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// Whether this error leaves the underlying stream in an unknown state.
    ///
    /// A fatal error means no further frame can be read reliably, so the owning
    /// loop must close the connection.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::Io(_)
                | ProtocolError::Framing(_)
                | ProtocolError::ConnectionClosed
                | ProtocolError::Decode(_)
        )
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::Decode(err.to_string())
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
