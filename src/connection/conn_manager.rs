//! Channel supervision
//!
//! [`ConnectionManager::open`] dials once and hands the caller a
//! [`ManagedChannel`] straight away. A background health loop then keeps
//! that channel usable for as long as the cancellation context lives:
//!
//! - `Ready`: reset the retry counter, re-poll after a short idle
//! - `TransientFailure` / `Connecting` / `Idle`: sleep `retries` backoff
//!   units, ask the transport to reconnect; once the retry ceiling is hit,
//!   force-close and re-dial with the same parameters
//! - `ShuttingDown`: re-dial with the same parameters
//!
//! Close and re-dial failures go to the error channel; the loop never
//! gives up on its own.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::conn_endpoint::Endpoint;
use super::conn_errors::ConnectionError;
use super::conn_state::ConnectionState;
use super::conn_transport::{ChannelTransport, Dialer};
use crate::context::CancelSignal;
use crate::metrics::ClientMetrics;

/// Tuning for the health loop
#[derive(Debug, Clone)]
pub struct HealthOptions {
    /// Consecutive reconnect requests before the channel is replaced
    pub max_reconnect_retries: u32,
    /// One backoff step; the n-th retry sleeps `n * backoff_unit`
    pub backoff_unit: Duration,
    /// Idle time between polls while the channel is ready
    pub ready_poll_interval: Duration,
    /// Upper bound on waiting for the next state transition
    pub state_change_timeout: Duration,
    /// Depth of the error channel
    pub error_channel_capacity: usize,
}

impl Default for HealthOptions {
    fn default() -> Self {
        Self {
            max_reconnect_retries: 5,
            backoff_unit: Duration::from_secs(1),
            ready_poll_interval: Duration::from_secs(1),
            state_change_timeout: Duration::from_secs(5),
            error_channel_capacity: 10,
        }
    }
}

/// Caller-facing handle to the supervised channel.
///
/// The underlying transport may be swapped by the health loop; always go
/// through [`current`](Self::current) instead of caching the transport.
pub struct ManagedChannel<T> {
    current: Arc<ArcSwap<T>>,
    endpoint: Arc<Endpoint>,
    replacements: Arc<AtomicU64>,
}

impl<T> Clone for ManagedChannel<T> {
    fn clone(&self) -> Self {
        Self {
            current: self.current.clone(),
            endpoint: self.endpoint.clone(),
            replacements: self.replacements.clone(),
        }
    }
}

impl<T: ChannelTransport> ManagedChannel<T> {
    /// The transport currently in service
    pub fn current(&self) -> Arc<T> {
        self.current.load_full()
    }

    pub fn state(&self) -> ConnectionState {
        self.current.load().state()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// How many times the health loop has swapped in a fresh transport
    pub fn replacement_count(&self) -> u64 {
        self.replacements.load(Ordering::Acquire)
    }

    fn install(&self, transport: T) {
        self.current.store(Arc::new(transport));
        self.replacements.fetch_add(1, Ordering::AcqRel);
    }
}

/// Owns one physical channel and its health loop
pub struct ConnectionManager<D: Dialer> {
    dialer: D,
    options: HealthOptions,
    metrics: Option<Arc<ClientMetrics>>,
}

impl<D: Dialer> ConnectionManager<D> {
    pub fn new(dialer: D, options: HealthOptions) -> Self {
        Self {
            dialer,
            options,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ClientMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Dial `endpoint` and start supervising the channel.
    ///
    /// Returns as soon as the first dial succeeds; the channel may not be
    /// ready yet. The health loop runs until `cancel` fires, then closes
    /// the channel and drops its end of the error channel.
    pub async fn open(
        self,
        endpoint: &str,
        cancel: CancelSignal,
    ) -> Result<
        (
            ManagedChannel<D::Transport>,
            mpsc::Receiver<ConnectionError>,
        ),
        ConnectionError,
    > {
        if self.options.error_channel_capacity == 0 {
            return Err(ConnectionError::Configuration(
                "error_channel_capacity must be > 0".to_string(),
            ));
        }

        let endpoint = Endpoint::parse(endpoint)?;
        let transport = self.dialer.dial(&endpoint).await?;

        let channel = ManagedChannel {
            current: Arc::new(ArcSwap::from_pointee(transport)),
            endpoint: Arc::new(endpoint),
            replacements: Arc::new(AtomicU64::new(0)),
        };
        let (errors_tx, errors_rx) = mpsc::channel(self.options.error_channel_capacity);

        let monitor = HealthMonitor {
            dialer: self.dialer,
            options: self.options,
            metrics: self.metrics,
            channel: channel.clone(),
            errors: errors_tx,
        };
        tokio::spawn(monitor.run(cancel));

        info!(endpoint = %channel.endpoint(), "Connection manager started");
        Ok((channel, errors_rx))
    }
}

struct HealthMonitor<D: Dialer> {
    dialer: D,
    options: HealthOptions,
    metrics: Option<Arc<ClientMetrics>>,
    channel: ManagedChannel<D::Transport>,
    errors: mpsc::Sender<ConnectionError>,
}

impl<D: Dialer> HealthMonitor<D> {
    async fn run(self, cancel: CancelSignal) {
        let mut retries: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                self.shutdown().await;
                return;
            }

            let transport = self.channel.current();
            let state = transport.state();

            match state {
                ConnectionState::Ready => {
                    retries = 0;
                    cancel.sleep(self.options.ready_poll_interval).await;
                    continue;
                }
                ConnectionState::TransientFailure
                | ConnectionState::Connecting
                | ConnectionState::Idle => {
                    if retries < self.options.max_reconnect_retries {
                        if !cancel.sleep(self.options.backoff_unit * retries).await {
                            continue;
                        }
                        debug!(
                            endpoint = %self.channel.endpoint(),
                            state = %state,
                            retry = retries + 1,
                            "Requesting reconnect"
                        );
                        transport.reset_connect_backoff();
                        retries += 1;
                        if let Some(m) = &self.metrics {
                            m.reconnect_attempts.inc();
                        }
                    } else {
                        warn!(
                            endpoint = %self.channel.endpoint(),
                            state = %state,
                            retries,
                            "Reconnect ceiling reached, replacing channel"
                        );
                        if let Err(e) = transport.close().await {
                            self.report(e);
                        }
                        self.redial().await;
                        retries = 0;
                    }
                }
                ConnectionState::ShuttingDown => {
                    warn!(endpoint = %self.channel.endpoint(), "Channel shut down unexpectedly, re-opening");
                    self.redial().await;
                    retries = 0;
                }
            }

            let transport = self.channel.current();
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::timeout(
                    self.options.state_change_timeout,
                    transport.wait_for_state_change(state),
                ) => {}
            }
        }
    }

    async fn redial(&self) {
        match self.dialer.dial(self.channel.endpoint()).await {
            Ok(fresh) => {
                self.channel.install(fresh);
                if let Some(m) = &self.metrics {
                    m.channel_replacements.inc();
                }
                info!(
                    endpoint = %self.channel.endpoint(),
                    replacements = self.channel.replacement_count(),
                    "Channel re-opened"
                );
            }
            Err(e) => {
                error!(endpoint = %self.channel.endpoint(), error = %e, "Failed to re-open channel");
                self.report(e);
            }
        }
    }

    async fn shutdown(&self) {
        let transport = self.channel.current();
        if let Err(e) = transport.close().await {
            self.report(e);
        }
        info!(endpoint = %self.channel.endpoint(), "Connection manager stopped");
    }

    fn report(&self, err: ConnectionError) {
        if let Some(m) = &self.metrics {
            m.connection_errors.inc();
        }
        match self.errors.try_send(err) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(err)) => {
                warn!(error = %err, "Connection error channel full, dropping report");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Connection error channel has no reader");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CancelHandle;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::watch;

    struct FixedTransport {
        state: watch::Sender<ConnectionState>,
    }

    #[async_trait]
    impl ChannelTransport for FixedTransport {
        fn state(&self) -> ConnectionState {
            *self.state.borrow()
        }
        fn reset_connect_backoff(&self) {}
        async fn wait_for_state_change(&self, from: ConnectionState) -> bool {
            let mut rx = self.state.subscribe();
            let changed = rx.wait_for(|s| *s != from).await.is_ok();
            changed
        }
        async fn close(&self) -> Result<(), ConnectionError> {
            self.state.send_replace(ConnectionState::ShuttingDown);
            Ok(())
        }
    }

    struct CountingDialer {
        dials: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Dialer for CountingDialer {
        type Transport = FixedTransport;
        async fn dial(&self, _endpoint: &Endpoint) -> Result<FixedTransport, ConnectionError> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            let (state, _) = watch::channel(ConnectionState::Ready);
            Ok(FixedTransport { state })
        }
    }

    #[tokio::test]
    async fn test_invalid_endpoint_opens_nothing() {
        let dials = Arc::new(AtomicUsize::new(0));
        let handle = CancelHandle::new();
        let manager = ConnectionManager::new(
            CountingDialer { dials: dials.clone() },
            HealthOptions::default(),
        );

        let result = manager.open("http://", handle.signal()).await;
        assert!(matches!(result, Err(ConnectionError::InvalidEndpoint { .. })));
        assert_eq!(dials.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_capacity_rejected() {
        let handle = CancelHandle::new();
        let options = HealthOptions {
            error_channel_capacity: 0,
            ..HealthOptions::default()
        };
        let manager = ConnectionManager::new(
            CountingDialer { dials: Arc::new(AtomicUsize::new(0)) },
            options,
        );
        let result = manager.open("http://localhost:1", handle.signal()).await;
        assert!(matches!(result, Err(ConnectionError::Configuration(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_channel_left_alone_then_closed_on_cancel() {
        let dials = Arc::new(AtomicUsize::new(0));
        let handle = CancelHandle::new();
        let manager = ConnectionManager::new(
            CountingDialer { dials: dials.clone() },
            HealthOptions::default(),
        );

        let (channel, mut errors) = manager
            .open("http://127.0.0.1:10000", handle.signal())
            .await
            .unwrap();
        assert_eq!(channel.endpoint().port(), 10000);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(channel.state(), ConnectionState::Ready);
        assert_eq!(channel.replacement_count(), 0);
        assert_eq!(dials.load(Ordering::SeqCst), 1);

        handle.cancel();
        // The loop drops its sender on exit, which closes the channel.
        assert!(errors.recv().await.is_none());
        assert_eq!(channel.state(), ConnectionState::ShuttingDown);
    }
}
