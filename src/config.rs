//! Client configuration
//!
//! Loaded from TOML with three sections, `[connection]`, `[auth]` and
//! `[bundle]`. Every knob has a default; environment overrides are applied
//! only when the caller asks for them.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use solana_sdk::signature::Keypair;

use crate::auth::{Role, SessionOptions};
use crate::bundle::SubmitterOptions;
use crate::connection::{HealthOptions, MessageLimits, TonicDialer};
use crate::endpoints::BlockEngineRegion;

/// Complete client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub bundle: BundleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Block engine URL; takes precedence over `region`
    #[serde(default)]
    pub endpoint: String,

    /// Region code (AMS, FRA, NYC, TKO) used when `endpoint` is empty
    #[serde(default)]
    pub region: Option<String>,

    /// Reconnect requests before the channel is replaced
    #[serde(default = "default_max_reconnect_retries")]
    pub max_reconnect_retries: u32,

    /// One backoff step in seconds
    #[serde(default = "default_one_sec")]
    pub backoff_unit_secs: u64,

    #[serde(default = "default_one_sec")]
    pub ready_poll_interval_secs: u64,

    #[serde(default = "default_state_change_timeout")]
    pub state_change_timeout_secs: u64,

    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_secs: u64,

    #[serde(default = "default_keepalive_timeout")]
    pub keepalive_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_message_size")]
    pub max_decoding_message_size: usize,

    #[serde(default = "default_message_size")]
    pub max_encoding_message_size: usize,

    #[serde(default = "default_error_channel_capacity")]
    pub error_channel_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_role")]
    pub role: Role,

    /// Path to a JSON keypair file, or a base58-encoded secret key
    #[serde(default)]
    pub keypair: String,

    /// Refresh this many seconds before the access token expires
    #[serde(default = "default_refresh_margin")]
    pub refresh_margin_secs: u64,

    #[serde(default = "default_refresh_retry_delay")]
    pub refresh_retry_delay_secs: u64,

    #[serde(default = "default_error_channel_capacity")]
    pub error_channel_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Solana JSON-RPC endpoint for signature status queries
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    #[serde(default = "default_check_retries")]
    pub check_retries: u32,

    #[serde(default = "default_check_retry_delay")]
    pub check_retry_delay_secs: u64,

    #[serde(default = "default_status_timeout")]
    pub status_timeout_secs: u64,

    #[serde(default = "default_one_sec")]
    pub status_retry_delay_secs: u64,
}

// Default value functions
fn default_max_reconnect_retries() -> u32 { 5 }
fn default_one_sec() -> u64 { 1 }
fn default_state_change_timeout() -> u64 { 5 }
fn default_keepalive_interval() -> u64 { 10 }
fn default_keepalive_timeout() -> u64 { 5 }
fn default_connect_timeout() -> u64 { 10 }
fn default_message_size() -> usize { 16 * 1024 * 1024 }
fn default_error_channel_capacity() -> usize { 10 }
fn default_role() -> Role { Role::Searcher }
fn default_refresh_margin() -> u64 { 15 }
fn default_refresh_retry_delay() -> u64 { 60 }
fn default_rpc_url() -> String { "https://api.mainnet-beta.solana.com".to_string() }
fn default_check_retries() -> u32 { 5 }
fn default_check_retry_delay() -> u64 { 5 }
fn default_status_timeout() -> u64 { 15 }

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            region: None,
            max_reconnect_retries: default_max_reconnect_retries(),
            backoff_unit_secs: default_one_sec(),
            ready_poll_interval_secs: default_one_sec(),
            state_change_timeout_secs: default_state_change_timeout(),
            keepalive_interval_secs: default_keepalive_interval(),
            keepalive_timeout_secs: default_keepalive_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            max_decoding_message_size: default_message_size(),
            max_encoding_message_size: default_message_size(),
            error_channel_capacity: default_error_channel_capacity(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            role: default_role(),
            keypair: String::new(),
            refresh_margin_secs: default_refresh_margin(),
            refresh_retry_delay_secs: default_refresh_retry_delay(),
            error_channel_capacity: default_error_channel_capacity(),
        }
    }
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            check_retries: default_check_retries(),
            check_retry_delay_secs: default_check_retry_delay(),
            status_timeout_secs: default_status_timeout(),
            status_retry_delay_secs: default_one_sec(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let config: ClientConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;
        Ok(config)
    }

    /// Overlay `BLOCK_ENGINE_URL`, `BLOCK_ENGINE_ROLE`, `BLOCK_ENGINE_KEYPAIR`
    /// and `SOLANA_RPC_URL`, reading a `.env` file first if one exists.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        dotenvy::dotenv().ok();

        if let Ok(url) = std::env::var("BLOCK_ENGINE_URL") {
            self.connection.endpoint = url;
        }
        if let Ok(role) = std::env::var("BLOCK_ENGINE_ROLE") {
            self.auth.role = role
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .context("Invalid BLOCK_ENGINE_ROLE")?;
        }
        if let Ok(keypair) = std::env::var("BLOCK_ENGINE_KEYPAIR") {
            self.auth.keypair = keypair;
        }
        if let Ok(rpc_url) = std::env::var("SOLANA_RPC_URL") {
            self.bundle.rpc_url = rpc_url;
        }
        Ok(())
    }

    /// Endpoint URL to dial: the explicit endpoint, else the region's
    pub fn resolved_endpoint(&self) -> Result<String> {
        if !self.connection.endpoint.trim().is_empty() {
            return Ok(self.connection.endpoint.trim().to_string());
        }
        match self.connection.region.as_deref() {
            Some(code) => BlockEngineRegion::from_code(code)
                .map(|region| region.url().to_string())
                .ok_or_else(|| anyhow::anyhow!("Unknown block engine region: {}", code)),
            None => bail!("connection.endpoint or connection.region is required"),
        }
    }

    /// Reject values the runtime cannot work with
    pub fn validate(&self) -> Result<()> {
        self.resolved_endpoint()?;

        let c = &self.connection;
        if c.max_reconnect_retries == 0 {
            bail!("connection.max_reconnect_retries must be > 0");
        }
        if c.backoff_unit_secs == 0 || c.ready_poll_interval_secs == 0 || c.state_change_timeout_secs == 0 {
            bail!("connection intervals must be > 0");
        }
        if c.max_decoding_message_size == 0 || c.max_encoding_message_size == 0 {
            bail!("connection message size limits must be > 0");
        }
        if c.error_channel_capacity == 0 || self.auth.error_channel_capacity == 0 {
            bail!("error_channel_capacity must be > 0");
        }

        if self.auth.refresh_retry_delay_secs == 0 {
            bail!("auth.refresh_retry_delay_secs must be > 0");
        }

        let b = &self.bundle;
        if b.rpc_url.trim().is_empty() {
            bail!("bundle.rpc_url is required");
        }
        if b.check_retries == 0 {
            bail!("bundle.check_retries must be > 0");
        }
        if b.check_retry_delay_secs == 0 || b.status_timeout_secs == 0 || b.status_retry_delay_secs == 0 {
            bail!("bundle delays must be > 0");
        }
        Ok(())
    }
}

impl ConnectionConfig {
    pub fn health_options(&self) -> HealthOptions {
        HealthOptions {
            max_reconnect_retries: self.max_reconnect_retries,
            backoff_unit: Duration::from_secs(self.backoff_unit_secs),
            ready_poll_interval: Duration::from_secs(self.ready_poll_interval_secs),
            state_change_timeout: Duration::from_secs(self.state_change_timeout_secs),
            error_channel_capacity: self.error_channel_capacity,
        }
    }

    pub fn dialer(&self) -> TonicDialer {
        TonicDialer {
            keepalive_interval: Duration::from_secs(self.keepalive_interval_secs),
            keepalive_timeout: Duration::from_secs(self.keepalive_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            probe_interval: Duration::from_secs(self.ready_poll_interval_secs),
            limits: MessageLimits {
                max_decoding_message_size: self.max_decoding_message_size,
                max_encoding_message_size: self.max_encoding_message_size,
            },
        }
    }
}

impl AuthConfig {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            refresh_margin: Duration::from_secs(self.refresh_margin_secs),
            refresh_retry_delay: Duration::from_secs(self.refresh_retry_delay_secs),
            install_poll_interval: Duration::from_secs(1),
            error_channel_capacity: self.error_channel_capacity,
        }
    }

    /// Load the signing keypair from a JSON keypair file or a base58
    /// secret key
    pub fn load_keypair(&self) -> Result<Keypair> {
        let source = self.keypair.trim();
        if source.is_empty() {
            bail!("auth.keypair is required");
        }

        let bytes: Vec<u8> = if std::path::Path::new(source).is_file() {
            let content = std::fs::read(source)
                .with_context(|| format!("Failed to read keypair file: {}", source))?;
            serde_json::from_slice(&content).context("Failed to parse keypair JSON")?
        } else {
            bs58::decode(source)
                .into_vec()
                .context("Keypair is neither a readable file nor base58")?
        };

        if bytes.len() != 64 {
            bail!("Invalid keypair length: expected 64 bytes, got {}", bytes.len());
        }
        Keypair::try_from(bytes.as_slice()).context("Invalid keypair bytes")
    }
}

impl BundleConfig {
    pub fn submitter_options(&self) -> SubmitterOptions {
        SubmitterOptions {
            check_retries: self.check_retries,
            check_retry_delay: Duration::from_secs(self.check_retry_delay_secs),
            status_timeout: Duration::from_secs(self.status_timeout_secs),
            status_retry_delay: Duration::from_secs(self.status_retry_delay_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signature::Signer;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_file() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(config.connection.max_reconnect_retries, 5);
        assert_eq!(config.connection.max_decoding_message_size, 16 * 1024 * 1024);
        assert_eq!(config.auth.role, Role::Searcher);
        assert_eq!(config.auth.refresh_margin_secs, 15);
        assert_eq!(config.auth.refresh_retry_delay_secs, 60);
        assert_eq!(config.bundle.check_retries, 5);
        assert_eq!(config.bundle.status_timeout_secs, 15);

        // No endpoint configured
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_and_conversions() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[connection]
region = "FRA"
max_reconnect_retries = 3

[auth]
role = "validator"

[bundle]
check_retries = 7
status_retry_delay_secs = 2
"#
        )
        .unwrap();

        let config = ClientConfig::from_file(file.path().to_str().unwrap()).unwrap();
        config.validate().unwrap();
        assert_eq!(
            config.resolved_endpoint().unwrap(),
            "https://frankfurt.mainnet.block-engine.jito.wtf"
        );
        assert_eq!(config.auth.role, Role::Validator);

        let health = config.connection.health_options();
        assert_eq!(health.max_reconnect_retries, 3);
        assert_eq!(health.backoff_unit, Duration::from_secs(1));

        let submitter = config.bundle.submitter_options();
        assert_eq!(submitter.check_retries, 7);
        assert_eq!(submitter.status_retry_delay, Duration::from_secs(2));

        let session = config.auth.session_options();
        assert_eq!(session.refresh_margin, Duration::from_secs(15));
    }

    #[test]
    fn test_validation_rejects_zeroes() {
        let mut config = ClientConfig::default();
        config.connection.endpoint = "https://example.com".into();
        config.validate().unwrap();

        config.bundle.check_retries = 0;
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.connection.region = Some("XYZ".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_keypair_from_json_and_base58() {
        let keypair = Keypair::new();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let auth = AuthConfig {
            keypair: file.path().to_str().unwrap().to_string(),
            ..AuthConfig::default()
        };
        assert_eq!(auth.load_keypair().unwrap().pubkey(), keypair.pubkey());

        let auth = AuthConfig {
            keypair: keypair.to_base58_string(),
            ..AuthConfig::default()
        };
        assert_eq!(auth.load_keypair().unwrap().pubkey(), keypair.pubkey());

        let auth = AuthConfig {
            keypair: "not-a-key".into(),
            ..AuthConfig::default()
        };
        assert!(auth.load_keypair().is_err());
    }
}
