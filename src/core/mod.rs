//! # Core Protocol Components
//!
//! Packet model and frame codec.
//!
//! ## Components
//! - **Packet**: the JSON envelope and its value tree, including set encoding
//! - **Codec**: length-prefixed framing, usable directly or as a tokio codec
//!
//! ## Wire Format
//! ```text
//! [Length(4, big-endian)] [UTF-8 JSON(Length)]
//! ```
//!
//! Maximum frame size is 65535 bytes including the prefix.

pub mod codec;
pub mod packet;
