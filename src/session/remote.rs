//! Remote collaborators of the session controller
//!
//! `IdentityFetcher` answers "who is the bearer of this token", and
//! `Authenticator` exchanges credentials for a token. `FleetApi` implements
//! both over the fleet GraphQL client; tests supply their own.

use crate::auth::{AccessToken, Identity};
use async_trait::async_trait;
use fleetdesk_client::{ClientError, FleetClient};
use std::fmt;
use thiserror::Error;

/// Why an identity lookup failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Token invalid or expired
    #[error("token rejected: {0}")]
    Unauthorized(String),

    /// Network or server trouble; the token may still be fine
    #[error("identity lookup failed: {0}")]
    Transport(String),

    /// The server answered with something that is not a valid identity
    #[error("identity payload rejected: {0}")]
    Malformed(String),
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Unauthorized(_) => "unauthorized",
            FetchError::Transport(_) => "transport",
            FetchError::Malformed(_) => "malformed",
        }
    }
}

impl From<ClientError> for FetchError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Unauthorized(m)
            | ClientError::PermissionDenied(m)
            | ClientError::Authentication(m) => FetchError::Unauthorized(m),
            ClientError::Transport(m) | ClientError::Server(m) => FetchError::Transport(m),
            ClientError::Timeout => FetchError::Transport("request timed out".into()),
            ClientError::InvalidResponse(m) => FetchError::Malformed(m),
            ClientError::Serialization(e) => FetchError::Malformed(e.to_string()),
        }
    }
}

/// Why an explicit sign-in failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignInError {
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("sign-in request failed: {0}")]
    Transport(String),

    #[error("sign-in rejected by server: {0}")]
    Server(String),

    #[error("sign-in response rejected: {0}")]
    Malformed(String),
}

impl From<ClientError> for SignInError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Authentication(m)
            | ClientError::Unauthorized(m)
            | ClientError::PermissionDenied(m) => SignInError::InvalidCredentials(m),
            ClientError::Transport(m) => SignInError::Transport(m),
            ClientError::Timeout => SignInError::Transport("request timed out".into()),
            ClientError::Server(m) => SignInError::Server(m),
            ClientError::InvalidResponse(m) => SignInError::Malformed(m),
            ClientError::Serialization(e) => SignInError::Malformed(e.to_string()),
        }
    }
}

/// Email and password as typed by the operator
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// A successful credential exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginGrant {
    pub token: AccessToken,
    pub identity: Identity,
}

/// Resolves a token to the identity it belongs to
#[async_trait]
pub trait IdentityFetcher: Send + Sync {
    async fn who_am_i(&self, token: &AccessToken) -> Result<Identity, FetchError>;
}

/// Exchanges credentials for a token
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<LoginGrant, SignInError>;
}

/// Both remote operations over the fleet GraphQL API
#[derive(Clone)]
pub struct FleetApi {
    client: FleetClient,
}

impl FleetApi {
    pub fn new(client: FleetClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &FleetClient {
        &self.client
    }
}

#[async_trait]
impl IdentityFetcher for FleetApi {
    async fn who_am_i(&self, token: &AccessToken) -> Result<Identity, FetchError> {
        let payload = self.client.me(token.as_str()).await?;
        Identity::try_from(payload).map_err(|e| FetchError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl Authenticator for FleetApi {
    async fn authenticate(&self, credentials: &Credentials) -> Result<LoginGrant, SignInError> {
        let payload = self
            .client
            .login(&credentials.email, &credentials.password)
            .await?;

        let token = AccessToken::new(payload.token)
            .ok_or_else(|| SignInError::Malformed("empty token".into()))?;
        let identity =
            Identity::try_from(payload.user).map_err(|e| SignInError::Malformed(e.to_string()))?;

        Ok(LoginGrant { token, identity })
    }
}
