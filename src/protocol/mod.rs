//! # Protocol Layer
//!
//! Connection-level semantics on top of the frame codec.
//!
//! - **Handshake**: shared-secret `auth` / `auth-response` exchange
//! - **Correlator**: client-side request ids and response matching
//! - **Dispatcher**: server-side auth gate and per-type packet routing
//! - **Packet types**: the vocabulary of `type` strings

pub mod correlator;
pub mod dispatcher;
pub mod handshake;
pub mod packet_type;


pub use correlator::Correlator;
pub use dispatcher::{ConnectionState, Dispatcher, HandlerRegistry, MISSING_PACKET};
pub use packet_type::PacketType;
