//! tonic-backed transport
//!
//! tonic channels reconnect on their own but do not expose connectivity,
//! so each transport keeps a state cell fed by two sources:
//!
//! - a probe task that dials the same endpoint on every probe interval,
//!   including while the channel is ready
//! - callers that see `Unavailable` from an RPC and report it through
//!   [`TonicTransport::observe_status`]

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Notify};
use tonic::transport::{Channel, ClientTlsConfig};
use tracing::{debug, info, warn};

use super::conn_endpoint::Endpoint;
use super::conn_errors::ConnectionError;
use super::conn_state::ConnectionState;
use super::conn_transport::{ChannelTransport, Dialer};

/// 16 MiB, the block engine's streaming message ceiling
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Per-call message size limits for generated streaming clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageLimits {
    pub max_decoding_message_size: usize,
    pub max_encoding_message_size: usize,
}

impl Default for MessageLimits {
    fn default() -> Self {
        Self {
            max_decoding_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_encoding_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// Dial options shared by every channel a manager opens
#[derive(Debug, Clone)]
pub struct TonicDialer {
    pub keepalive_interval: Duration,
    pub keepalive_timeout: Duration,
    pub connect_timeout: Duration,
    /// Pause between connectivity probes
    pub probe_interval: Duration,
    pub limits: MessageLimits,
}

impl Default for TonicDialer {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(10),
            keepalive_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            probe_interval: Duration::from_secs(1),
            limits: MessageLimits::default(),
        }
    }
}

impl TonicDialer {
    fn build_endpoint(
        &self,
        endpoint: &Endpoint,
    ) -> Result<tonic::transport::Endpoint, ConnectionError> {
        let mut builder = tonic::transport::Endpoint::from_shared(endpoint.uri())
            .map_err(|e| ConnectionError::invalid_endpoint(endpoint.as_str(), e.to_string()))?
            .http2_keep_alive_interval(self.keepalive_interval)
            .keep_alive_timeout(self.keepalive_timeout)
            .keep_alive_while_idle(true)
            .connect_timeout(self.connect_timeout);

        if endpoint.is_tls() {
            let tls = ClientTlsConfig::new().domain_name(endpoint.host());
            builder = builder.tls_config(tls).map_err(|e| ConnectionError::Dial {
                endpoint: endpoint.authority(),
                message: format!("TLS setup failed: {e}"),
            })?;
        }

        Ok(builder)
    }
}

#[async_trait]
impl Dialer for TonicDialer {
    type Transport = TonicTransport;

    async fn dial(&self, endpoint: &Endpoint) -> Result<TonicTransport, ConnectionError> {
        let builder = self.build_endpoint(endpoint)?;
        let channel = builder.connect_lazy();
        let (state, _) = watch::channel(ConnectionState::Idle);

        let transport = TonicTransport {
            inner: Arc::new(Inner {
                target: endpoint.authority(),
                builder,
                channel,
                state,
                wake: Notify::new(),
            }),
            limits: self.limits,
        };
        tokio::spawn(probe_loop(
            Arc::downgrade(&transport.inner),
            self.probe_interval,
        ));

        info!(target = %endpoint.authority(), tls = endpoint.is_tls(), "gRPC channel opened");
        Ok(transport)
    }
}

struct Inner {
    target: String,
    builder: tonic::transport::Endpoint,
    channel: Channel,
    state: watch::Sender<ConnectionState>,
    wake: Notify,
}

impl Inner {
    /// Move to `next` unless the channel is shutting down.
    ///
    /// Returns `false` if the channel was already shut down.
    fn transition(&self, next: ConnectionState) -> bool {
        let mut open = true;
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::ShuttingDown {
                open = false;
                false
            } else if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
        open
    }

    /// Dial the endpoint once and record the result.
    ///
    /// A ready channel stays ready while the probe is in flight.
    async fn probe(&self) -> bool {
        let before = *self.state.borrow();
        if before == ConnectionState::ShuttingDown {
            return false;
        }
        if before != ConnectionState::Ready && !self.transition(ConnectionState::Connecting) {
            return false;
        }

        let next = match self.builder.connect().await {
            Ok(_) => ConnectionState::Ready,
            Err(e) => {
                if before == ConnectionState::Ready {
                    warn!(target = %self.target, error = %e, "Ready channel lost connectivity");
                } else {
                    debug!(target = %self.target, error = %e, "Connection probe failed");
                }
                ConnectionState::TransientFailure
            }
        };
        self.transition(next)
    }
}

/// Probe until the transport is closed or dropped
async fn probe_loop(inner: Weak<Inner>, interval: Duration) {
    loop {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        if !inner.probe().await {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = inner.wake.notified() => {}
        }
    }
}

/// A lazily connected tonic channel plus its observed connectivity
#[derive(Clone)]
pub struct TonicTransport {
    inner: Arc<Inner>,
    limits: MessageLimits,
}

impl TonicTransport {
    /// Channel handle for generated service clients
    pub fn channel(&self) -> Channel {
        self.inner.channel.clone()
    }

    pub fn limits(&self) -> MessageLimits {
        self.limits
    }

    pub fn target(&self) -> &str {
        &self.inner.target
    }

    /// Record that an RPC on this channel failed with `Unavailable` and
    /// probe again right away
    pub fn mark_unavailable(&self) {
        if self.inner.transition(ConnectionState::TransientFailure) {
            self.inner.wake.notify_one();
        }
    }

    /// Feed the outcome of an RPC made on [`channel`](Self::channel).
    ///
    /// Only `Unavailable` says anything about connectivity.
    pub fn observe_status(&self, status: &tonic::Status) {
        if status.code() == tonic::Code::Unavailable {
            debug!(target = %self.inner.target, message = %status.message(), "RPC reported channel unavailable");
            self.mark_unavailable();
        }
    }
}

#[async_trait]
impl ChannelTransport for TonicTransport {
    fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    fn reset_connect_backoff(&self) {
        self.inner.wake.notify_one();
    }

    async fn wait_for_state_change(&self, from: ConnectionState) -> bool {
        let mut rx = self.inner.state.subscribe();
        let changed = rx.wait_for(|state| *state != from).await.is_ok();
        changed
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        // The underlying connection goes away with the last Channel clone.
        self.inner.state.send_replace(ConnectionState::ShuttingDown);
        self.inner.wake.notify_one();
        debug!(target = %self.inner.target, "gRPC channel closed");
        Ok(())
    }
}
