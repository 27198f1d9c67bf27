//! Authentication and authorization primitives
//!
//! - `AccessToken`: opaque bearer token, redacted in logs
//! - `Identity`: validated operator identity (id, email, role)
//! - `Role` / `RoleSet`: the `Admin`, `Editor`, `Viewer` vocabulary
//! - `Capability`: per-action role requirements used by pages

mod capabilities;
mod identity;
mod roles;
mod token;

pub use capabilities::Capability;
pub use identity::{Identity, IdentityError};
pub use roles::{Role, RoleParseError, RoleSet};
pub use token::AccessToken;
