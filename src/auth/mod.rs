//! Authentication Module
//!
//! Challenge/signature handshake against the block engine's auth service,
//! a self-refreshing bearer credential, and the metadata plumbing that
//! attaches it to outgoing calls.

// Submodules
pub mod auth_errors;
pub mod auth_interceptor;
pub mod auth_service;
pub mod auth_session;
pub mod auth_types;

// Re-exports for convenience
pub use auth_errors::AuthError;
pub use auth_interceptor::{
    attach_bearer, AccessTokenInterceptor, BearerInterceptor, ACCESS_TOKEN_HEADER,
    AUTHORIZATION_HEADER,
};
pub use auth_service::AuthServiceClient;
pub use auth_session::{AuthSession, AuthState, SessionOptions};
pub use auth_types::{Credential, CredentialCell, Role, Token, TokenPair};
