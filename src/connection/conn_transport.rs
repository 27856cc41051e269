//! Seams between the manager and whatever actually carries bytes

use async_trait::async_trait;

use super::conn_endpoint::Endpoint;
use super::conn_errors::ConnectionError;
use super::conn_state::ConnectionState;

/// A physical channel whose connectivity can be observed and nudged
#[async_trait]
pub trait ChannelTransport: Send + Sync + 'static {
    /// Current connectivity as the transport sees it
    fn state(&self) -> ConnectionState;

    /// Ask the transport to retry its connection now instead of waiting
    /// out its own internal backoff.
    fn reset_connect_backoff(&self);

    /// Wait until the state differs from `from`.
    ///
    /// Returns `false` if the transport can no longer report transitions.
    async fn wait_for_state_change(&self, from: ConnectionState) -> bool;

    /// Tear the channel down
    async fn close(&self) -> Result<(), ConnectionError>;
}

/// Opens channels with a fixed set of options
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    type Transport: ChannelTransport;

    /// Open a channel to `endpoint`.
    ///
    /// Must return without waiting for the channel to become ready.
    async fn dial(&self, endpoint: &Endpoint) -> Result<Self::Transport, ConnectionError>;
}
