//! Roles, tokens and the session credential

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Identity the session authenticates as. Fixed for the session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Relayer,
    Searcher,
    Validator,
}

impl Role {
    /// Protocol enum value
    pub fn as_i32(self) -> i32 {
        match self {
            Role::Relayer => 0,
            Role::Searcher => 1,
            Role::Validator => 2,
        }
    }

    /// Protocol enum name
    pub fn as_str_name(self) -> &'static str {
        match self {
            Role::Relayer => "RELAYER",
            Role::Searcher => "SEARCHER",
            Role::Validator => "VALIDATOR",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str_name())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relayer" => Ok(Role::Relayer),
            "searcher" => Ok(Role::Searcher),
            "validator" => Ok(Role::Validator),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// A token as issued by the auth service
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub expires_at_utc: DateTime<Utc>,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &"<redacted>")
            .field("expires_at_utc", &self.expires_at_utc)
            .finish()
    }
}

/// Result of a successful challenge exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: Token,
    pub refresh_token: Token,
}

/// The live bearer credential: value, expiry and the signed challenge
/// that earned it. Always read and replaced as a whole.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    bearer: String,
    expires_at: DateTime<Utc>,
    signature: Vec<u8>,
}

impl Credential {
    pub fn new(access_token: Token, signature: Vec<u8>) -> Self {
        Self {
            bearer: access_token.value,
            expires_at: access_token.expires_at_utc,
            signature,
        }
    }

    pub fn bearer(&self) -> &str {
        &self.bearer
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Raw signature bytes over the handshake challenge
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("bearer", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("signature_len", &self.signature.len())
            .finish()
    }
}

/// Lock-guarded slot holding the current credential.
///
/// Readers get a full copy taken under the lock, so a concurrent refresh
/// is seen either entirely or not at all.
#[derive(Debug, Default)]
pub struct CredentialCell {
    inner: Mutex<Option<Credential>>,
}

impl CredentialCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the credential atomically
    pub fn install(&self, credential: Credential) {
        *self.inner.lock() = Some(credential);
    }

    pub fn snapshot(&self) -> Option<Credential> {
        self.inner.lock().clone()
    }

    /// Consistent `(bearer, expiry)` pair
    pub fn bearer_and_expiry(&self) -> Option<(String, DateTime<Utc>)> {
        self.inner
            .lock()
            .as_ref()
            .map(|c| (c.bearer.clone(), c.expires_at))
    }

    pub fn is_installed(&self) -> bool {
        self.inner.lock().is_some()
    }

    pub fn clear(&self) {
        *self.inner.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(value: &str, secs: i64) -> Token {
        Token {
            value: value.to_string(),
            expires_at_utc: Utc::now() + Duration::seconds(secs),
        }
    }

    #[test]
    fn test_role_parsing_and_wire_values() {
        assert_eq!("searcher".parse::<Role>().unwrap(), Role::Searcher);
        assert_eq!(" VALIDATOR ".parse::<Role>().unwrap(), Role::Validator);
        assert!("miner".parse::<Role>().is_err());

        assert_eq!(Role::Relayer.as_i32(), 0);
        assert_eq!(Role::Searcher.as_i32(), 1);
        assert_eq!(Role::Validator.as_i32(), 2);
        assert_eq!(Role::Searcher.to_string(), "SEARCHER");
    }

    #[test]
    fn test_cell_install_and_snapshot() {
        let cell = CredentialCell::new();
        assert!(!cell.is_installed());
        assert!(cell.snapshot().is_none());

        let access = token("abc", 300);
        let expiry = access.expires_at_utc;
        cell.install(Credential::new(access, vec![1, 2, 3]));

        let (bearer, expires_at) = cell.bearer_and_expiry().unwrap();
        assert_eq!(bearer, "abc");
        assert_eq!(expires_at, expiry);
        assert_eq!(cell.snapshot().unwrap().signature(), &[1, 2, 3]);

        cell.clear();
        assert!(!cell.is_installed());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let credential = Credential::new(token("super-secret", 60), vec![9; 64]);
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("signature_len: 64"));

        let rendered = format!("{:?}", token("hidden", 1));
        assert!(!rendered.contains("hidden"));
    }

    #[test]
    fn test_expiry_check() {
        let credential = Credential::new(token("t", 10), vec![]);
        assert!(!credential.is_expired_at(Utc::now()));
        assert!(credential.is_expired_at(Utc::now() + Duration::seconds(11)));
    }
}
