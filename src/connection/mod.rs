//! Connection Manager Module
//!
//! One supervised channel per remote endpoint: health polling, backoff,
//! forced replacement, and out-of-band error reporting.

// Submodules
pub mod conn_endpoint;
pub mod conn_errors;
pub mod conn_manager;
pub mod conn_state;
pub mod conn_tonic;
pub mod conn_transport;

// Re-exports for convenience
pub use conn_endpoint::{Endpoint, Scheme};
pub use conn_errors::ConnectionError;
pub use conn_manager::{ConnectionManager, HealthOptions, ManagedChannel};
pub use conn_state::ConnectionState;
pub use conn_tonic::{MessageLimits, TonicDialer, TonicTransport};
pub use conn_transport::{ChannelTransport, Dialer};
