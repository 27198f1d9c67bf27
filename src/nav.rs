//! Routes and the navigation shell
//!
//! The shell is derived from a session snapshot only; it holds no state of
//! its own.

use crate::auth::{Identity, Role, RoleSet};
use crate::gate::{self, GateOutcome};
use crate::session::{Session, SessionController};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Title shown at the top of the shell
pub const APP_TITLE: &str = "Fleet Admin";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown route: {0}")]
pub struct RouteError(pub String);

/// Every page of the admin console
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Vehicles,
    NewVehicle,
    Vehicle(String),
    EditVehicle(String),
    Reports,
    Users,
}

impl Route {
    /// Where a fresh login lands
    pub const LANDING: Route = Route::Vehicles;

    pub fn is_public(&self) -> bool {
        matches!(self, Route::Login)
    }

    /// Roles allowed on this route; `None` means any signed-in operator
    pub fn required_roles(&self) -> Option<RoleSet> {
        match self {
            Route::NewVehicle | Route::EditVehicle(_) => {
                Some(RoleSet::of(&[Role::Admin, Role::Editor]))
            }
            Route::Users => Some(RoleSet::of(&[Role::Admin])),
            Route::Login | Route::Vehicles | Route::Vehicle(_) | Route::Reports => None,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Login => gate::LOGIN_ROUTE.to_string(),
            Route::Vehicles => "/vehicles".to_string(),
            Route::NewVehicle => "/vehicles/new".to_string(),
            Route::Vehicle(id) => format!("/vehicles/{}", id),
            Route::EditVehicle(id) => format!("/vehicles/{}/edit", id),
            Route::Reports => "/reports".to_string(),
            Route::Users => "/users".to_string(),
        }
    }
}

impl FromStr for Route {
    type Err = RouteError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let trimmed = path.trim().trim_end_matches('/');
        let segments: Vec<&str> = trimmed
            .strip_prefix('/')
            .ok_or_else(|| RouteError(path.to_string()))?
            .split('/')
            .collect();

        match segments.as_slice() {
            ["login"] => Ok(Route::Login),
            ["vehicles"] => Ok(Route::Vehicles),
            ["vehicles", "new"] => Ok(Route::NewVehicle),
            ["vehicles", id] if !id.is_empty() => Ok(Route::Vehicle(id.to_string())),
            ["vehicles", id, "edit"] if !id.is_empty() => Ok(Route::EditVehicle(id.to_string())),
            ["reports"] => Ok(Route::Reports),
            ["users"] => Ok(Route::Users),
            _ => Err(RouteError(path.to_string())),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// One menu entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavItem {
    pub label: &'static str,
    pub route: Route,
}

/// Avatar initial, email and role of the signed-in operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityChip {
    pub initial: char,
    pub email: String,
    pub role: Role,
}

impl IdentityChip {
    pub fn from_identity(identity: &Identity) -> Self {
        let initial = identity
            .email()
            .chars()
            .next()
            .and_then(|c| c.to_uppercase().next())
            .unwrap_or('?');

        Self {
            initial,
            email: identity.email().to_string(),
            role: identity.role().clone(),
        }
    }
}

// Top-level pages of the route table, in display order
const MENU: [(&str, Route); 3] = [
    ("Users", Route::Users),
    ("Vehicles", Route::Vehicles),
    ("Reports", Route::Reports),
];

/// Role-aware chrome around the pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavShell {
    pub title: &'static str,
    pub items: Vec<NavItem>,
    pub identity: IdentityChip,
}

impl NavShell {
    /// Build the shell for a session; only signed-in sessions get one
    pub fn from_session(session: &Session) -> Option<Self> {
        if !session.is_authenticated() {
            return None;
        }
        let user = session.user()?;

        let items = MENU
            .iter()
            .filter(|(_, route)| gate::evaluate_route(session, route) == GateOutcome::Allow)
            .map(|(label, route)| NavItem {
                label: *label,
                route: route.clone(),
            })
            .collect();

        Some(Self {
            title: APP_TITLE,
            items,
            identity: IdentityChip::from_identity(user),
        })
    }

    /// Sign out and return where to go next
    pub fn logout(&self, controller: &SessionController) -> Route {
        controller.logout();
        Route::Login
    }
}

impl fmt::Display for NavShell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        for item in &self.items {
            writeln!(f, "  {:<10} {}", item.label, item.route)?;
        }
        write!(
            f,
            "[{}] {} ({})",
            self.identity.initial, self.identity.email, self.identity.role
        )
    }
}
