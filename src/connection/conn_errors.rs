use thiserror::Error;

use super::conn_state::ConnectionState;

/// Transport-level failures.
///
/// `InvalidEndpoint` and `Dial` surface from [`open`](super::ConnectionManager::open);
/// everything the health loop hits afterwards goes to the error channel.
#[derive(Debug, Clone, Error)]
pub enum ConnectionError {
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Dial failed (endpoint: {endpoint}): {message}")]
    Dial { endpoint: String, message: String },

    #[error("Close failed (endpoint: {endpoint}, state: {state}): {message}")]
    Close {
        endpoint: String,
        state: ConnectionState,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ConnectionError {
    pub fn invalid_endpoint(endpoint: &str, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_endpoint() {
        let err = ConnectionError::invalid_endpoint("http://", "missing host");
        assert_eq!(err.to_string(), "Invalid endpoint 'http://': missing host");

        let err = ConnectionError::Dial {
            endpoint: "be.example:443".into(),
            message: "refused".into(),
        };
        assert!(err.to_string().contains("be.example:443"));
    }
}
