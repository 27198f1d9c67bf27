//! Opaque access tokens

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A bearer token issued by the fleet API
///
/// The client never looks inside it. Empty or whitespace-only strings are not
/// tokens.
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token, rejecting blank input
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.len() != token.len() {
            return Some(Self(trimmed.to_string()));
        }
        Some(Self(token))
    }

    /// Get the raw token (for sending to the server only)
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for an `Authorization` header
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken([REDACTED])")
    }
}

impl<'de> Deserialize<'de> for AccessToken {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        AccessToken::new(raw).ok_or_else(|| serde::de::Error::custom("empty access token"))
    }
}
