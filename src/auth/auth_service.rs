use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;

use super::auth_types::{Role, Token, TokenPair};

/// The block engine's auth service, as seen by the session.
///
/// Implemented by an adapter over the generated gRPC client; errors are the
/// raw RPC status so the session can classify them.
#[async_trait]
pub trait AuthServiceClient: Send + Sync {
    /// `GenerateAuthChallenge(role, pubkey) -> challenge`
    async fn generate_auth_challenge(
        &self,
        role: Role,
        pubkey: &Pubkey,
    ) -> Result<String, tonic::Status>;

    /// `GenerateAuthTokens(challenge, signed_challenge, pubkey) -> (access, refresh)`
    async fn generate_auth_tokens(
        &self,
        challenge: &str,
        signed_challenge: &[u8],
        client_pubkey: &Pubkey,
    ) -> Result<TokenPair, tonic::Status>;

    /// `RefreshAccessToken(refresh_token) -> access`
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<Token, tonic::Status>;
}
