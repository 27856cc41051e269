//! Outgoing call metadata
//!
//! Authenticated calls carry `authorization: Bearer <token>`. Endpoints that
//! take a static token before any handshake get `access-token: <token>`
//! with no prefix.

use std::sync::Arc;

use tonic::metadata::{AsciiMetadataValue, MetadataMap};
use tonic::service::Interceptor;
use tonic::{Request, Status};

use super::auth_errors::AuthError;
use super::auth_types::CredentialCell;

pub const AUTHORIZATION_HEADER: &str = "authorization";
pub const ACCESS_TOKEN_HEADER: &str = "access-token";

/// Put `authorization: Bearer <bearer>` on `metadata`, replacing any
/// previous value.
pub fn attach_bearer(metadata: &mut MetadataMap, bearer: &str) -> Result<(), AuthError> {
    let value: AsciiMetadataValue = format!("Bearer {bearer}")
        .parse()
        .map_err(|_| AuthError::InvalidMetadata("bearer token is not valid ASCII metadata".into()))?;
    metadata.insert(AUTHORIZATION_HEADER, value);
    Ok(())
}

/// Attaches the session's current bearer credential to every call made
/// through a generated client built with `with_interceptor`.
#[derive(Debug, Clone)]
pub struct BearerInterceptor {
    credential: Arc<CredentialCell>,
}

impl BearerInterceptor {
    pub fn new(credential: Arc<CredentialCell>) -> Self {
        Self { credential }
    }
}

impl Interceptor for BearerInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let (bearer, _) = self
            .credential
            .bearer_and_expiry()
            .ok_or_else(|| Status::unauthenticated(AuthError::NotAuthenticated.to_string()))?;
        attach_bearer(request.metadata_mut(), &bearer)
            .map_err(|e| Status::internal(e.to_string()))?;
        Ok(request)
    }
}

/// Static `access-token` metadata for pre-handshake endpoints
#[derive(Debug, Clone)]
pub struct AccessTokenInterceptor {
    value: AsciiMetadataValue,
}

impl AccessTokenInterceptor {
    pub fn new(access_token: &str) -> Result<Self, AuthError> {
        let value = access_token
            .parse()
            .map_err(|_| AuthError::InvalidMetadata("access token is not valid ASCII metadata".into()))?;
        Ok(Self { value })
    }
}

impl Interceptor for AccessTokenInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        request
            .metadata_mut()
            .insert(ACCESS_TOKEN_HEADER, self.value.clone());
        Ok(request)
    }
}
