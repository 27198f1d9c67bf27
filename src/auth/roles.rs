//! Operator roles and role sets

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: '{0}' (expected Admin, Editor or Viewer)")]
pub struct RoleParseError(pub String);

/// Operator role as assigned by the fleet API
///
/// Anything outside the known vocabulary is kept as `Unrecognized` so it can be
/// displayed, but it never satisfies a role requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    /// Full access, including user management
    Admin,
    /// Can create and edit vehicles and log movements
    Editor,
    /// Read-only access
    Viewer,
    /// A role name this client does not know about
    Unrecognized(String),
}

impl Role {
    /// Parse a role name, keeping unknown names as `Unrecognized`
    pub fn parse(name: &str) -> Role {
        match Self::parse_known(name) {
            Ok(role) => role,
            Err(_) => {
                warn!(role = name, "Unrecognized role name");
                Role::Unrecognized(name.to_string())
            }
        }
    }

    /// Parse a role name, rejecting anything outside the known vocabulary
    pub fn parse_known(name: &str) -> Result<Role, RoleParseError> {
        match name {
            "Admin" => Ok(Role::Admin),
            "Editor" => Ok(Role::Editor),
            "Viewer" => Ok(Role::Viewer),
            other => Err(RoleParseError(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "Admin",
            Role::Editor => "Editor",
            Role::Viewer => "Viewer",
            Role::Unrecognized(name) => name,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Role::Unrecognized(_))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(Role::parse(&name))
    }
}

/// The roles allowed onto a protected surface
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet {
    roles: Vec<Role>,
}

impl RoleSet {
    pub fn new() -> Self {
        Self { roles: Vec::new() }
    }

    /// Build a set from known roles
    pub fn of(roles: &[Role]) -> Self {
        roles.iter().cloned().collect()
    }

    /// Add a role to the set
    pub fn add(&mut self, role: Role) {
        // Unrecognized roles can never be granted
        if !role.is_recognized() {
            return;
        }
        if !self.roles.contains(&role) {
            self.roles.push(role);
        }
    }

    /// Check whether the role is allowed
    pub fn contains(&self, role: &Role) -> bool {
        role.is_recognized() && self.roles.contains(role)
    }

    /// Get all roles
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Parse a comma separated list such as `"Admin,Editor"`
    pub fn parse_list(list: &str) -> Result<Self, RoleParseError> {
        list.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(Role::parse_known)
            .collect()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<T: IntoIterator<Item = Role>>(iter: T) -> Self {
        let mut set = RoleSet::new();
        for role in iter {
            set.add(role);
        }
        set
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.roles.iter().map(Role::as_str).collect();
        write!(f, "{}", names.join(", "))
    }
}
