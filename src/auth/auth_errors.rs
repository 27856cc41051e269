use thiserror::Error;

/// Handshake, refresh and metadata failures.
///
/// `Challenge`, `Signing`, `SignatureDecode` and `TokenExchange` end an
/// `authenticate` call; the caller re-invokes. `Refresh` and `Cancelled`
/// only ever travel over the session's error channel.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Challenge request failed: {0}")]
    Challenge(tonic::Status),

    #[error("Failed to sign challenge: {0}")]
    Signing(String),

    #[error("Failed to decode challenge signature: {0}")]
    SignatureDecode(String),

    #[error("Token exchange failed: {0}")]
    TokenExchange(tonic::Status),

    #[error("Failed to refresh access token: {0}")]
    Refresh(tonic::Status),

    #[error("No credential installed; authenticate first")]
    NotAuthenticated,

    #[error("Invalid metadata value: {0}")]
    InvalidMetadata(String),

    #[error("Authentication context cancelled")]
    Cancelled,
}

impl AuthError {
    /// Whether this error ended an `authenticate` call
    pub fn is_handshake_failure(&self) -> bool {
        matches!(
            self,
            Self::Challenge(_) | Self::Signing(_) | Self::SignatureDecode(_) | Self::TokenExchange(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_classification() {
        assert!(AuthError::Challenge(tonic::Status::unavailable("down")).is_handshake_failure());
        assert!(AuthError::TokenExchange(tonic::Status::permission_denied("no")).is_handshake_failure());
        assert!(!AuthError::Refresh(tonic::Status::internal("x")).is_handshake_failure());
        assert!(!AuthError::Cancelled.is_handshake_failure());
    }

    #[test]
    fn test_display() {
        let err = AuthError::Refresh(tonic::Status::unavailable("engine restarting"));
        assert!(err.to_string().starts_with("Failed to refresh access token"));
        assert!(err.to_string().contains("engine restarting"));
    }
}
