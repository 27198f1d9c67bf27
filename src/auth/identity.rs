//! The authenticated operator

use crate::auth::roles::Role;
use fleetdesk_client::UserPayload;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("identity has no id")]
    MissingId,

    #[error("identity has no email")]
    MissingEmail,

    #[error("identity has no role")]
    MissingRole,
}

/// A verified operator identity
///
/// Only constructed through validation, either from an API payload or from a
/// persisted record, so every instance has a non-empty id, email and role.
/// Serialized as `{"id", "email", "role": {"name"}}`, the same shape the
/// API returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UserPayload")]
pub struct Identity {
    id: String,
    email: String,
    #[serde(serialize_with = "role_object::serialize")]
    role: Role,
}

impl Identity {
    pub fn new(
        id: impl Into<String>,
        email: impl Into<String>,
        role: Role,
    ) -> Result<Self, IdentityError> {
        let id = id.into();
        let email = email.into();

        if id.trim().is_empty() {
            return Err(IdentityError::MissingId);
        }
        if email.trim().is_empty() {
            return Err(IdentityError::MissingEmail);
        }

        Ok(Self { id, email, role })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn role(&self) -> &Role {
        &self.role
    }
}

impl TryFrom<UserPayload> for Identity {
    type Error = IdentityError;

    fn try_from(payload: UserPayload) -> Result<Self, Self::Error> {
        let role = payload.role.ok_or(IdentityError::MissingRole)?;
        Identity::new(payload.id, payload.email, Role::parse(&role.name))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.email, self.role)
    }
}

/// Serde helper for the `{ "name": ... }` role object
mod role_object {
    use super::*;
    use serde::Serializer;

    #[derive(Serialize)]
    struct RoleRef<'a> {
        name: &'a str,
    }

    pub fn serialize<S>(role: &Role, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        RoleRef { name: role.as_str() }.serialize(serializer)
    }
}
