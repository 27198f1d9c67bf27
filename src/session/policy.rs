//! What hydration does when the identity lookup fails

use crate::session::remote::FetchError;

/// Outcome of a failed identity lookup during hydration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Keep what storage had; it is re-checked on the next start
    KeepTentative,
    /// Drop the session and the persisted record
    Discard,
}

/// Decides how hydration treats identity lookup failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HydrationPolicy {
    /// Never sign the operator out because of a failed lookup
    #[default]
    Tolerate,
    /// Sign out when the server says the token is no good; tolerate the rest
    ForceLogoutOnUnauthorized,
}

impl HydrationPolicy {
    pub fn on_fetch_failure(&self, err: &FetchError) -> FailureAction {
        match (self, err) {
            (HydrationPolicy::ForceLogoutOnUnauthorized, FetchError::Unauthorized(_)) => {
                FailureAction::Discard
            }
            _ => FailureAction::KeepTentative,
        }
    }
}
