//! Authorization gate
//!
//! Decides what a protected surface does with the current session. Pure:
//! same session and role set, same outcome.

use crate::auth::RoleSet;
use crate::nav::Route;
use crate::session::{Session, SessionStatus};
use std::fmt;

/// Where anonymous visitors are sent
pub const LOGIN_ROUTE: &str = "/login";

/// Text shown when a signed-in operator lacks the role
pub const ACCESS_DENIED: &str = "Access denied.";

/// What to do with a protected surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateOutcome {
    /// Session still hydrating; show nothing and do not redirect
    Pending,
    /// Nobody signed in; go to the given path
    Redirect(&'static str),
    Allow,
    /// Signed in without a permitted role
    Deny,
}

impl GateOutcome {
    /// Text to show in place of the protected content
    pub fn render(&self) -> &'static str {
        match self {
            GateOutcome::Pending | GateOutcome::Redirect(_) | GateOutcome::Allow => "",
            GateOutcome::Deny => ACCESS_DENIED,
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, GateOutcome::Allow)
    }
}

impl fmt::Display for GateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateOutcome::Pending => write!(f, "pending"),
            GateOutcome::Redirect(to) => write!(f, "redirect {}", to),
            GateOutcome::Allow => write!(f, "allow"),
            GateOutcome::Deny => write!(f, "deny"),
        }
    }
}

/// Gate a surface on the session and an optional set of permitted roles
///
/// Without a role set any signed-in operator is allowed. An unrecognized
/// role never satisfies a role set.
pub fn evaluate(session: &Session, allowed: Option<&RoleSet>) -> GateOutcome {
    match session.status() {
        SessionStatus::Hydrating => GateOutcome::Pending,
        SessionStatus::Anonymous => GateOutcome::Redirect(LOGIN_ROUTE),
        SessionStatus::Authenticated => match (allowed, session.user()) {
            (None, _) => GateOutcome::Allow,
            (Some(roles), Some(user)) if roles.contains(user.role()) => GateOutcome::Allow,
            _ => GateOutcome::Deny,
        },
    }
}

/// Gate a route; public routes are always allowed
pub fn evaluate_route(session: &Session, route: &Route) -> GateOutcome {
    if route.is_public() {
        return GateOutcome::Allow;
    }
    evaluate(session, route.required_roles().as_ref())
}
