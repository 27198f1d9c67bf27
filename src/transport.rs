//! Authorized GraphQL transport
//!
//! The one place where the session token reaches the network. The token is
//! read from the controller on every call, so requests made after `logout`
//! carry no credentials and requests made after `login` carry the new ones.

use crate::session::SessionController;
use fleetdesk_client::{ClientError, FleetClient};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

#[derive(Clone)]
pub struct AuthorizedClient {
    client: FleetClient,
    session: SessionController,
}

impl AuthorizedClient {
    pub fn new(client: FleetClient, session: SessionController) -> Self {
        Self { client, session }
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    /// Run a GraphQL document with whatever token the session holds right now
    pub async fn execute<V, T>(
        &self,
        query: &str,
        variables: Option<V>,
    ) -> Result<T, ClientError>
    where
        V: Serialize,
        T: DeserializeOwned,
    {
        let token = self.session.token();
        let result = self
            .client
            .execute(token.as_ref().map(|t| t.as_str()), query, variables)
            .await;

        if let Err(ClientError::Unauthorized(reason)) = &result {
            debug!(reason = %reason, with_token = token.is_some(), "Request not authorized");
        }
        result
    }
}
