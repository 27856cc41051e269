use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use block_engine_client::connection::{
    ChannelTransport, ConnectionError, ConnectionManager, ConnectionState, Dialer, Endpoint,
    HealthOptions, Scheme,
};
use block_engine_client::CancelHandle;
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_hostless_strings_are_invalid(raw in "[a-z0-9./]{0,16}") {
        // No scheme separator, so there is never a host
        let result = Endpoint::parse(&raw);
        let is_invalid_endpoint = matches!(result, Err(ConnectionError::InvalidEndpoint { .. }));
        prop_assert!(is_invalid_endpoint);
    }

    #[test]
    fn prop_scheme_without_host_is_invalid(scheme in "https?", port in proptest::option::of(1u16..)) {
        let raw = match port {
            Some(p) => format!("{scheme}://:{p}"),
            None => format!("{scheme}://"),
        };
        let is_invalid_endpoint = matches!(Endpoint::parse(&raw), Err(ConnectionError::InvalidEndpoint { .. }));
        prop_assert!(is_invalid_endpoint);
    }

    #[test]
    fn prop_valid_endpoints_resolve_host_and_port(
        tls in any::<bool>(),
        host in "[a-z][a-z0-9]{0,10}(\\.[a-z]{2,5}){0,2}",
        port in proptest::option::of(1u16..),
    ) {
        let scheme = if tls { "https" } else { "http" };
        let raw = match port {
            Some(p) => format!("{scheme}://{host}:{p}"),
            None => format!("{scheme}://{host}"),
        };

        let endpoint = Endpoint::parse(&raw).unwrap();
        prop_assert_eq!(endpoint.host(), host.as_str());
        prop_assert_eq!(endpoint.is_tls(), tls);
        let default_port = if tls { 443 } else { 80 };
        prop_assert_eq!(endpoint.port(), port.unwrap_or(default_port));
        prop_assert_eq!(endpoint.scheme().default_port(), default_port);
        prop_assert_eq!(endpoint.scheme() == Scheme::Tls, tls);
    }
}

struct NeverDialed {
    dials: Arc<AtomicUsize>,
}

struct Unused;

#[async_trait]
impl ChannelTransport for Unused {
    fn state(&self) -> ConnectionState {
        ConnectionState::Idle
    }
    fn reset_connect_backoff(&self) {}
    async fn wait_for_state_change(&self, _from: ConnectionState) -> bool {
        false
    }
    async fn close(&self) -> Result<(), ConnectionError> {
        Ok(())
    }
}

#[async_trait]
impl Dialer for NeverDialed {
    type Transport = Unused;

    async fn dial(&self, _endpoint: &Endpoint) -> Result<Unused, ConnectionError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        Ok(Unused)
    }
}

#[tokio::test]
async fn test_malformed_endpoints_open_no_channel() {
    let dials = Arc::new(AtomicUsize::new(0));
    let handle = CancelHandle::new();

    for raw in ["", "localhost", "http://", "https://:443", "unix:/var/run/engine.sock", "ftp://engine"] {
        let manager = ConnectionManager::new(
            NeverDialed { dials: dials.clone() },
            HealthOptions::default(),
        );
        let result = manager.open(raw, handle.signal()).await;
        assert!(
            matches!(result, Err(ConnectionError::InvalidEndpoint { .. })),
            "{raw:?} should be rejected"
        );
    }
    assert_eq!(dials.load(Ordering::SeqCst), 0);
}
