//! Authenticated session
//!
//! `authenticate` runs the challenge/signature handshake once and installs
//! the resulting bearer credential. A background task then keeps the
//! credential fresh until the session's cancellation signal fires:
//!
//! - refresh with the (never rotated) refresh token
//! - on success, install the new access token and sleep until
//!   `expiry - refresh_margin`
//! - on failure, report on the error channel and retry after
//!   `refresh_retry_delay`
//!
//! On cancellation the task reports [`AuthError::Cancelled`] and exits.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::auth_errors::AuthError;
use super::auth_interceptor::{attach_bearer, BearerInterceptor};
use super::auth_service::AuthServiceClient;
use super::auth_types::{Credential, CredentialCell, Role, Token};
use crate::context::CancelSignal;
use crate::metrics::ClientMetrics;

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AuthState {
    Unauthenticated = 0,
    Authenticating = 1,
    Authenticated = 2,
    Refreshing = 3,
    Terminated = 4,
}

impl From<u8> for AuthState {
    fn from(value: u8) -> Self {
        match value {
            0 => AuthState::Unauthenticated,
            1 => AuthState::Authenticating,
            2 => AuthState::Authenticated,
            3 => AuthState::Refreshing,
            _ => AuthState::Terminated,
        }
    }
}

/// Timing for the handshake wait and the refresh loop
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Refresh this long before the access token expires
    pub refresh_margin: Duration,
    /// Wait after a failed refresh before trying again
    pub refresh_retry_delay: Duration,
    /// Poll interval while waiting for the first credential
    pub install_poll_interval: Duration,
    /// Depth of the error channel
    pub error_channel_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            refresh_margin: Duration::from_secs(15),
            refresh_retry_delay: Duration::from_secs(60),
            install_poll_interval: Duration::from_secs(1),
            error_channel_capacity: 10,
        }
    }
}

/// One authenticated identity against one block engine
pub struct AuthSession {
    client: Arc<dyn AuthServiceClient>,
    keypair: Arc<Keypair>,
    role: Role,
    credential: Arc<CredentialCell>,
    state: Arc<AtomicU8>,
    cancel: CancelSignal,
    options: SessionOptions,
    errors: mpsc::Sender<AuthError>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl AuthSession {
    /// Create an unauthenticated session plus the receiving end of its
    /// error channel.
    pub fn new(
        client: Arc<dyn AuthServiceClient>,
        keypair: Arc<Keypair>,
        role: Role,
        cancel: CancelSignal,
        options: SessionOptions,
    ) -> (Self, mpsc::Receiver<AuthError>) {
        let (errors, errors_rx) = mpsc::channel(options.error_channel_capacity.max(1));
        let session = Self {
            client,
            keypair,
            role,
            credential: Arc::new(CredentialCell::new()),
            state: Arc::new(AtomicU8::new(AuthState::Unauthenticated as u8)),
            cancel,
            options,
            errors,
            refresh_task: Mutex::new(None),
            metrics: None,
        };
        (session, errors_rx)
    }

    pub fn with_metrics(mut self, metrics: Arc<ClientMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn state(&self) -> AuthState {
        AuthState::from(self.state.load(Ordering::Acquire))
    }

    /// Current credential, if the handshake has completed
    pub fn credential(&self) -> Option<Credential> {
        self.credential.snapshot()
    }

    /// Shared cell for interceptors and other readers
    pub fn credential_cell(&self) -> Arc<CredentialCell> {
        self.credential.clone()
    }

    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    /// Interceptor for generated clients sharing this session's credential
    pub fn interceptor(&self) -> BearerInterceptor {
        BearerInterceptor::new(self.credential.clone())
    }

    /// Wrap `message` in a request carrying the current bearer credential
    pub fn authorize<T>(&self, message: T) -> Result<tonic::Request<T>, AuthError> {
        let (bearer, _) = self
            .credential
            .bearer_and_expiry()
            .ok_or(AuthError::NotAuthenticated)?;
        let mut request = tonic::Request::new(message);
        attach_bearer(request.metadata_mut(), &bearer)?;
        Ok(request)
    }

    /// Run the handshake and start the refresh loop.
    ///
    /// Handshake failures are returned as-is with no retry. Calling this
    /// again replaces the credential and the refresh loop.
    pub async fn authenticate(&self) -> Result<(), AuthError> {
        if self.cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }
        self.set_state(AuthState::Authenticating);

        let result = self.handshake().await;
        let (access_token, refresh_token, signature) = match result {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(role = %self.role, error = %e, "Authentication handshake failed");
                self.set_state(AuthState::Unauthenticated);
                return Err(e);
            }
        };

        let expires_at = access_token.expires_at_utc;
        self.credential.install(Credential::new(access_token, signature));
        self.set_state(AuthState::Authenticated);
        if let Some(m) = &self.metrics {
            m.authenticated.set(1);
        }
        info!(role = %self.role, pubkey = %self.keypair.pubkey(), expires_at = %expires_at, "Authenticated with block engine");

        self.start_refresh(refresh_token);

        while !self.credential.is_installed() {
            debug!("Waiting for challenge to be solved");
            if !self.cancel.sleep(self.options.install_poll_interval).await {
                return Err(AuthError::Cancelled);
            }
        }
        Ok(())
    }

    async fn handshake(&self) -> Result<(Token, Token, Vec<u8>), AuthError> {
        let pubkey = self.keypair.pubkey();

        let challenge = self
            .client
            .generate_auth_challenge(self.role, &pubkey)
            .await
            .map_err(AuthError::Challenge)?;

        let message = format!("{pubkey}-{challenge}");
        let signature = self
            .keypair
            .try_sign_message(message.as_bytes())
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        let signed = bs58::decode(signature.to_string())
            .into_vec()
            .map_err(|e| AuthError::SignatureDecode(e.to_string()))?;

        let pair = self
            .client
            .generate_auth_tokens(&message, &signed, &pubkey)
            .await
            .map_err(AuthError::TokenExchange)?;

        Ok((pair.access_token, pair.refresh_token, signed))
    }

    fn start_refresh(&self, refresh_token: Token) {
        let worker = RefreshWorker {
            client: self.client.clone(),
            credential: self.credential.clone(),
            state: self.state.clone(),
            cancel: self.cancel.clone(),
            options: self.options.clone(),
            errors: self.errors.clone(),
            metrics: self.metrics.clone(),
        };
        let handle = tokio::spawn(worker.run(refresh_token));

        if let Some(previous) = self.refresh_task.lock().replace(handle) {
            previous.abort();
        }
    }

    fn set_state(&self, state: AuthState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

impl Drop for AuthSession {
    fn drop(&mut self) {
        if let Some(task) = self.refresh_task.lock().take() {
            task.abort();
        }
    }
}

struct RefreshWorker {
    client: Arc<dyn AuthServiceClient>,
    credential: Arc<CredentialCell>,
    state: Arc<AtomicU8>,
    cancel: CancelSignal,
    options: SessionOptions,
    errors: mpsc::Sender<AuthError>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl RefreshWorker {
    async fn run(self, refresh_token: Token) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            self.state
                .store(AuthState::Refreshing as u8, Ordering::Release);
            let result = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.client.refresh_access_token(&refresh_token.value) => result,
            };

            match result {
                Ok(access_token) => {
                    let expires_at = access_token.expires_at_utc;
                    self.credential.install(Credential::new(
                        access_token,
                        self.current_signature(),
                    ));
                    self.state
                        .store(AuthState::Authenticated as u8, Ordering::Release);
                    if let Some(m) = &self.metrics {
                        m.token_refreshes.inc();
                    }

                    let until_expiry = (expires_at - Utc::now())
                        .to_std()
                        .unwrap_or(Duration::ZERO);
                    let wait = until_expiry.saturating_sub(self.options.refresh_margin);
                    debug!(expires_at = %expires_at, wait_secs = wait.as_secs(), "Access token refreshed");

                    if !wait.is_zero() && !self.cancel.sleep(wait).await {
                        break;
                    }
                }
                Err(status) => {
                    warn!(code = ?status.code(), message = status.message(), "Access token refresh failed");
                    if let Some(m) = &self.metrics {
                        m.token_refresh_failures.inc();
                    }
                    self.state
                        .store(AuthState::Authenticated as u8, Ordering::Release);
                    self.report(AuthError::Refresh(status));

                    if !self.cancel.sleep(self.options.refresh_retry_delay).await {
                        break;
                    }
                }
            }
        }

        self.state
            .store(AuthState::Terminated as u8, Ordering::Release);
        if let Some(m) = &self.metrics {
            m.authenticated.set(0);
        }
        self.report(AuthError::Cancelled);
        info!("Token refresh loop stopped");
    }

    fn current_signature(&self) -> Vec<u8> {
        self.credential
            .snapshot()
            .map(|c| c.signature().to_vec())
            .unwrap_or_default()
    }

    fn report(&self, err: AuthError) {
        match self.errors.try_send(err) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(err)) => {
                warn!(error = %err, "Auth error channel full, dropping report");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::auth_types::TokenPair;
    use crate::context::CancelHandle;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct StaticAuth {
        challenges: AtomicUsize,
        refreshes: AtomicUsize,
        fail_challenge: bool,
        last_challenge: Mutex<Option<String>>,
    }

    impl StaticAuth {
        fn new(fail_challenge: bool) -> Self {
            Self {
                challenges: AtomicUsize::new(0),
                refreshes: AtomicUsize::new(0),
                fail_challenge,
                last_challenge: Mutex::new(None),
            }
        }
    }

    fn token(value: &str, secs: i64) -> Token {
        Token {
            value: value.to_string(),
            expires_at_utc: Utc::now() + chrono::Duration::seconds(secs),
        }
    }

    #[async_trait]
    impl AuthServiceClient for StaticAuth {
        async fn generate_auth_challenge(
            &self,
            _role: Role,
            _pubkey: &Pubkey,
        ) -> Result<String, tonic::Status> {
            self.challenges.fetch_add(1, Ordering::SeqCst);
            if self.fail_challenge {
                return Err(tonic::Status::unavailable("auth down"));
            }
            Ok("nonce42".to_string())
        }

        async fn generate_auth_tokens(
            &self,
            challenge: &str,
            signed_challenge: &[u8],
            _client_pubkey: &Pubkey,
        ) -> Result<TokenPair, tonic::Status> {
            assert_eq!(signed_challenge.len(), 64);
            *self.last_challenge.lock() = Some(challenge.to_string());
            Ok(TokenPair {
                access_token: token("access-0", 3600),
                refresh_token: token("refresh", 86_400),
            })
        }

        async fn refresh_access_token(&self, refresh_token: &str) -> Result<Token, tonic::Status> {
            assert_eq!(refresh_token, "refresh");
            let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(token(&format!("access-{n}"), 3600))
        }
    }

    #[test]
    fn test_state_from_u8() {
        assert_eq!(AuthState::from(0), AuthState::Unauthenticated);
        assert_eq!(AuthState::from(3), AuthState::Refreshing);
        assert_eq!(AuthState::from(200), AuthState::Terminated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_authenticate_installs_credential_and_signs_pubkey_challenge() {
        let handle = CancelHandle::new();
        let auth = Arc::new(StaticAuth::new(false));
        let keypair = Arc::new(Keypair::new());
        let (session, _errors) = AuthSession::new(
            auth.clone(),
            keypair.clone(),
            Role::Searcher,
            handle.signal(),
            SessionOptions::default(),
        );

        assert!(session.authorize(()).is_err());
        session.authenticate().await.unwrap();

        let expected = format!("{}-nonce42", keypair.pubkey());
        assert_eq!(auth.last_challenge.lock().as_deref(), Some(expected.as_str()));

        let credential = session.credential().unwrap();
        assert!(credential.bearer().starts_with("access-"));
        assert_eq!(credential.signature().len(), 64);

        let request = session.authorize(()).unwrap();
        let header = request.metadata().get("authorization").unwrap();
        assert!(header.to_str().unwrap().starts_with("Bearer access-"));
    }

    #[tokio::test]
    async fn test_challenge_failure_is_terminal() {
        let handle = CancelHandle::new();
        let auth = Arc::new(StaticAuth::new(true));
        let (session, _errors) = AuthSession::new(
            auth.clone(),
            Arc::new(Keypair::new()),
            Role::Validator,
            handle.signal(),
            SessionOptions::default(),
        );

        let err = session.authenticate().await.unwrap_err();
        assert!(matches!(err, AuthError::Challenge(_)));
        assert_eq!(session.state(), AuthState::Unauthenticated);
        assert!(session.credential().is_none());
        assert_eq!(auth.challenges.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_terminates_refresh_loop() {
        let handle = CancelHandle::new();
        let auth = Arc::new(StaticAuth::new(false));
        let (session, mut errors) = AuthSession::new(
            auth,
            Arc::new(Keypair::new()),
            Role::Searcher,
            handle.signal(),
            SessionOptions::default(),
        );
        session.authenticate().await.unwrap();

        handle.cancel();
        let err = errors.recv().await.unwrap();
        assert!(matches!(err, AuthError::Cancelled));
        assert_eq!(session.state(), AuthState::Terminated);
    }

    #[tokio::test]
    async fn test_authenticate_after_cancel() {
        let handle = CancelHandle::new();
        let (session, _errors) = AuthSession::new(
            Arc::new(StaticAuth::new(false)),
            Arc::new(Keypair::new()),
            Role::Searcher,
            handle.signal(),
            SessionOptions::default(),
        );
        handle.cancel();
        assert!(matches!(
            session.authenticate().await,
            Err(AuthError::Cancelled)
        ));
    }
}
