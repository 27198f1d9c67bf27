//! Fleetdesk - session and authorization core of the fleet admin console
//!
//! Restores a signed-in operator across restarts, verifies them against the
//! fleet API, and decides which pages and menu items they may see.
//!
//! - `storage`: the persisted session record
//! - `session`: the session state machine and its remote collaborators
//! - `gate`: allow, deny or redirect decisions
//! - `nav`: routes and the role-aware navigation shell
//! - `transport`: GraphQL calls carrying the current token

pub mod auth;
pub mod gate;
pub mod nav;
pub mod session;
pub mod storage;
pub mod transport;

pub use auth::{AccessToken, Capability, Identity, Role, RoleSet};
pub use gate::{evaluate, evaluate_route, GateOutcome};
pub use nav::{NavShell, Route};
pub use session::{
    Credentials, FetchError, FleetApi, HydrationPolicy, Session, SessionController, SessionStatus,
    SignInError,
};
pub use storage::{FileStore, MemoryStore, SessionStore};
pub use transport::AuthorizedClient;
