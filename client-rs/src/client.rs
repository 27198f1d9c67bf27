//! Fleet API client implementation

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::messages::{
    GraphQlError, GraphQlRequest, GraphQlResponse, LoginData, LoginPayload, LoginVariables, MeData,
    UserPayload, LOGIN_MUTATION, ME_QUERY,
};

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Internal client state
struct ClientInner {
    config: ClientConfig,
    http: reqwest::Client,
}

/// GraphQL-over-HTTP client for the fleet API
///
/// Stateless with respect to authentication: every call takes the bearer
/// token explicitly. This struct is cheaply cloneable as it uses an internal Arc.
#[derive(Clone)]
pub struct FleetClient {
    inner: Arc<ClientInner>,
}

impl FleetClient {
    /// Create a new client with the given configuration
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(ClientInner { config, http }),
        })
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Execute a GraphQL document and decode its `data` member
    ///
    /// When `bearer` is set it is sent as `Authorization: Bearer <token>`;
    /// otherwise the request carries no authorization header.
    pub async fn execute<V, T>(&self, bearer: Option<&str>, query: &str, variables: Option<V>) -> Result<T>
    where
        V: Serialize,
        T: DeserializeOwned,
    {
        let body = GraphQlRequest {
            query,
            variables,
            operation_name: None,
        };

        let mut request = self.inner.http.post(&self.inner.config.url).json(&body);
        if let Some(token) = bearer {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ClientError::Unauthorized("token is not a valid header value".into()))?;
            request = request.header(AUTHORIZATION, value);
        }
        if let Some(timeout) = self.inner.config.request_timeout {
            request = request.timeout(timeout);
        }

        debug!(url = %self.inner.config.url, authorized = bearer.is_some(), "Executing GraphQL operation");
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        match status {
            StatusCode::UNAUTHORIZED => {
                return Err(ClientError::Unauthorized(body_excerpt(&bytes, status)));
            }
            StatusCode::FORBIDDEN => {
                return Err(ClientError::PermissionDenied(body_excerpt(&bytes, status)));
            }
            _ => {}
        }

        let envelope: GraphQlResponse<T> = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => return Err(ClientError::InvalidResponse(e.to_string())),
            Err(_) => return Err(ClientError::Server(body_excerpt(&bytes, status))),
        };

        if !envelope.errors.is_empty() {
            return Err(classify_errors(&envelope.errors));
        }

        if !status.is_success() {
            return Err(ClientError::Server(body_excerpt(&bytes, status)));
        }

        envelope
            .data
            .ok_or_else(|| ClientError::InvalidResponse("response carried no data".into()))
    }

    /// Ask the server who the bearer of `token` is
    pub async fn me(&self, token: &str) -> Result<UserPayload> {
        let data: MeData = self.execute::<(), _>(Some(token), ME_QUERY, None).await?;
        data.me
            .ok_or_else(|| ClientError::Unauthorized("no identity bound to token".into()))
    }

    /// Exchange credentials for a token and the signed-in user
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginPayload> {
        let variables = LoginVariables { email, password };
        let data: LoginData = match self.execute(None, LOGIN_MUTATION, Some(variables)).await {
            Ok(data) => data,
            // An unauthenticated login request can only mean bad credentials
            Err(ClientError::Unauthorized(message)) => {
                return Err(ClientError::Authentication(message));
            }
            Err(e) => return Err(e),
        };

        data.login
            .ok_or_else(|| ClientError::Authentication("login returned no session".into()))
    }
}

/// Map a GraphQL `errors` array onto a single client error
fn classify_errors(errors: &[GraphQlError]) -> ClientError {
    for error in errors {
        let message = error.message.to_lowercase();

        match error.code() {
            Some("UNAUTHENTICATED") | Some("UNAUTHORIZED") => {
                return ClientError::Unauthorized(error.message.clone());
            }
            Some("FORBIDDEN") => return ClientError::PermissionDenied(error.message.clone()),
            _ => {}
        }

        if message.contains("unauthorized") || message.contains("unauthenticated") {
            return ClientError::Unauthorized(error.message.clone());
        }
        if message.starts_with("forbidden") {
            return ClientError::PermissionDenied(error.message.clone());
        }
        if message.contains("invalid credentials") {
            return ClientError::Authentication(error.message.clone());
        }
    }

    let joined = errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    warn!(errors = %joined, "GraphQL operation failed");
    ClientError::Server(joined)
}

fn body_excerpt(bytes: &[u8], status: StatusCode) -> String {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    if text.is_empty() {
        status.to_string()
    } else {
        text.chars().take(200).collect()
    }
}
