//! # Utility Modules
//!
//! Supporting utilities shared by the client and server.
//!
//! ## Components
//! - **Logging**: `tracing-subscriber` setup from `LoggingConfig`
//! - **Metrics**: atomic counters for server activity
//! - **Timeout**: async timeout wrapper mapping to `ProtocolError::Timeout`

pub mod logging;
pub mod metrics;
pub mod timeout;

pub use metrics::{Metrics, MetricsSnapshot};
