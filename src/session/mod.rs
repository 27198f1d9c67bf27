//! Session state and its controller
//!
//! A `Session` is always in one of three states:
//! - `Hydrating`: startup has not finished restoring the previous session
//! - `Authenticated`: both a token and a verified identity are held
//! - `Anonymous`: neither is held
//!
//! The `SessionController` is the only writer. Everything else reads
//! snapshots.

mod controller;
mod policy;
mod remote;

pub use controller::SessionController;
pub use policy::{FailureAction, HydrationPolicy};
pub use remote::{
    Authenticator, Credentials, FetchError, FleetApi, IdentityFetcher, LoginGrant, SignInError,
};

use crate::auth::{AccessToken, Identity};

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    /// Restoring from storage; consumers render nothing yet
    Hydrating,
    /// Token and identity are both held
    Authenticated,
    /// Nobody is signed in
    Anonymous,
}

/// Snapshot of the authentication state
///
/// Fields are private so that a finished session always satisfies
/// `Authenticated` iff token and user are both present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    token: Option<AccessToken>,
    user: Option<Identity>,
    status: SessionStatus,
}

impl Session {
    /// Initial state of every controller
    pub fn hydrating() -> Self {
        Self {
            token: None,
            user: None,
            status: SessionStatus::Hydrating,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            token: None,
            user: None,
            status: SessionStatus::Anonymous,
        }
    }

    pub fn authenticated(token: AccessToken, user: Identity) -> Self {
        Self {
            token: Some(token),
            user: Some(user),
            status: SessionStatus::Authenticated,
        }
    }

    /// State adopted from storage while hydration verifies it
    pub(crate) fn tentative(token: AccessToken, user: Option<Identity>) -> Self {
        Self {
            token: Some(token),
            user,
            status: SessionStatus::Hydrating,
        }
    }

    /// Finish a tentative state without remote confirmation
    ///
    /// A token without an identity is not proof of anything, so it resolves
    /// to `Anonymous`.
    pub(crate) fn resolve(self) -> Self {
        match (self.token, self.user) {
            (Some(token), Some(user)) => Session::authenticated(token, user),
            _ => Session::anonymous(),
        }
    }

    pub fn token(&self) -> Option<&AccessToken> {
        self.token.as_ref()
    }

    pub fn user(&self) -> Option<&Identity> {
        self.user.as_ref()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_hydrating(&self) -> bool {
        self.status == SessionStatus::Hydrating
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    pub fn is_anonymous(&self) -> bool {
        self.status == SessionStatus::Anonymous
    }
}
