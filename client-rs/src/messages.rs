//! Wire types for the fleet GraphQL API
//!
//! These are deliberately loose: fields the server may omit are optional, and
//! IDs are accepted as either strings or numbers. Callers validate them into
//! their own domain types.

use serde::{Deserialize, Deserializer, Serialize};

/// Identity query answered for the bearer of the request's token
pub const ME_QUERY: &str = "query Me { me { id email role { name } } }";

/// Credential exchange; returns a token and the signed-in user
pub const LOGIN_MUTATION: &str = "mutation Login($email: String!, $password: String!) { \
     login(email: $email, password: $password) { token user { id email role { name } } } }";

/// A GraphQL request body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlRequest<'a, V: Serialize> {
    pub query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<V>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<&'a str>,
}

/// A GraphQL response envelope
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

/// A single entry of a GraphQL `errors` array
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GraphQlError {
    pub message: String,
    #[serde(default)]
    pub path: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub extensions: Option<serde_json::Value>,
}

impl GraphQlError {
    /// The `extensions.code` value, if the server set one
    pub fn code(&self) -> Option<&str> {
        self.extensions
            .as_ref()
            .and_then(|ext| ext.get("code"))
            .and_then(|code| code.as_str())
    }
}

/// Role object as returned by the API
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RolePayload {
    pub name: String,
}

/// User object as returned by the API
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct UserPayload {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<RolePayload>,
}

/// Result of the login mutation
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoginPayload {
    pub token: String,
    pub user: UserPayload,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MeData {
    pub me: Option<UserPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginData {
    pub login: Option<LoginPayload>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginVariables<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}
