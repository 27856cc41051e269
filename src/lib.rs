//! Block engine client
//!
//! A supervised gRPC channel, a challenge-authenticated session that keeps
//! its bearer token fresh, and bundle submission that reconciles the
//! results stream with ledger signature statuses.

pub mod auth;
pub mod bundle;
pub mod config;
pub mod connection;
pub mod context;
pub mod endpoints;
pub mod metrics;
pub mod structured_logging;
pub mod wire;

pub use auth::{AuthError, AuthSession, AuthState, Role};
pub use bundle::{BundleConfirmation, BundleError, BundleSubmitter, RejectionReason};
pub use config::ClientConfig;
pub use connection::{ConnectionError, ConnectionManager, ConnectionState, Endpoint};
pub use context::{CancelHandle, CancelSignal};
pub use endpoints::BlockEngineRegion;
pub use metrics::ClientMetrics;

// Re-export commonly used types
pub use solana_sdk::{pubkey::Pubkey, signature::Signature, transaction::VersionedTransaction};
