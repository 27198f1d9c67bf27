//! Session controller
//!
//! Owns the current `Session` and is the only thing that mutates it or the
//! persisted record. Cheap to clone; clones share state.
//!
//! Every state change goes through one lock together with an epoch counter.
//! `login` and `logout` bump the epoch, so a lookup that was started under
//! an older epoch (a slow hydration, a background refresh) finds the epoch
//! moved on and drops its result instead of overwriting newer state.

use crate::auth::{AccessToken, Identity};
use crate::session::policy::{FailureAction, HydrationPolicy};
use crate::session::remote::{Authenticator, Credentials, IdentityFetcher, SignInError};
use crate::session::Session;
use crate::storage::{PersistedRecord, SessionStore};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Storage fix-up found while loading, applied only if still current
#[derive(Debug)]
enum StoreRepair {
    Nothing,
    RewriteToken(AccessToken),
    DiscardRecord,
}

struct ControllerInner {
    store: SessionStore,
    fetcher: Arc<dyn IdentityFetcher>,
    policy: HydrationPolicy,
    epoch: Mutex<u64>,
    state: watch::Sender<Session>,
    state_rx: watch::Receiver<Session>,
    hydrate_started: AtomicBool,
}

/// Owner of the session lifecycle
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<ControllerInner>,
}

impl SessionController {
    /// Create a controller in the `Hydrating` state
    pub fn new(store: SessionStore, fetcher: Arc<dyn IdentityFetcher>) -> Self {
        Self::with_policy(store, fetcher, HydrationPolicy::default())
    }

    pub fn with_policy(
        store: SessionStore,
        fetcher: Arc<dyn IdentityFetcher>,
        policy: HydrationPolicy,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(Session::hydrating());

        Self {
            inner: Arc::new(ControllerInner {
                store,
                fetcher,
                policy,
                epoch: Mutex::new(0),
                state: state_tx,
                state_rx,
                hydrate_started: AtomicBool::new(false),
            }),
        }
    }

    pub fn policy(&self) -> HydrationPolicy {
        self.inner.policy
    }

    /// Snapshot of the current session
    pub fn current_session(&self) -> Session {
        self.inner.state_rx.borrow().clone()
    }

    /// Receiver that sees every state change
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state_rx.clone()
    }

    /// Token to attach to outbound requests, if any
    pub fn token(&self) -> Option<AccessToken> {
        self.inner.state_rx.borrow().token().cloned()
    }

    /// Wait until the session has left `Hydrating`
    pub async fn resolved(&self) -> Session {
        let mut rx = self.subscribe();
        let resolved = rx
            .wait_for(|s| !s.is_hydrating())
            .await
            .map(|session| (*session).clone());
        resolved.unwrap_or_else(|_| self.current_session())
    }

    /// Restore the previous session from storage and verify it remotely
    ///
    /// Runs once per controller; later calls return the current session
    /// without doing anything. A `login` or `logout` made before the first
    /// call already decided the session, so hydration is skipped then too.
    /// The returned session is never `Hydrating` unless a concurrent
    /// operation has taken over.
    pub async fn hydrate(&self) -> Session {
        if self.inner.hydrate_started.swap(true, Ordering::SeqCst) {
            debug!("Hydration already ran");
            return self.current_session();
        }

        let epoch = *self.inner.epoch.lock();
        if epoch != 0 {
            debug!(epoch, "Session set before hydration, skipping");
            return self.current_session();
        }

        // Storage repairs wait for `apply` so a concurrent logout skips them
        let (tentative, repair) = self.inner.load_tentative();

        let token = match tentative.token().cloned() {
            Some(token) => token,
            None => {
                debug!("No stored session");
                self.inner.apply(epoch, |inner| {
                    inner.repair(repair);
                    Session::anonymous()
                });
                return self.current_session();
            }
        };

        let has_user = tentative.user().is_some();
        self.inner.apply(epoch, |inner| {
            inner.repair(repair);
            tentative.clone()
        });

        match self.inner.fetcher.who_am_i(&token).await {
            Ok(identity) => {
                self.inner.apply(epoch, |inner| {
                    info!(
                        user_id = identity.id(),
                        role = %identity.role(),
                        "Session restored"
                    );
                    inner.persist(&token, &identity);
                    Session::authenticated(token, identity)
                });
            }
            Err(err) => match self.inner.policy.on_fetch_failure(&err) {
                FailureAction::KeepTentative => {
                    warn!(
                        error = %err,
                        kind = err.kind(),
                        restored_user = has_user,
                        "Could not verify stored session"
                    );
                    self.inner.apply(epoch, |_| tentative.resolve());
                }
                FailureAction::Discard => {
                    warn!(error = %err, "Stored session rejected, signing out");
                    self.inner.apply(epoch, |inner| {
                        inner.clear_store();
                        Session::anonymous()
                    });
                }
            },
        }

        self.current_session()
    }

    /// Enter `Authenticated` with the given token and identity
    ///
    /// Persists both keys before returning. When called inside a tokio
    /// runtime, also starts a background re-fetch of the identity; its
    /// failure is logged and never reverts the login.
    pub fn login(&self, token: AccessToken, identity: Identity) -> Option<JoinHandle<()>> {
        let epoch = {
            let mut epoch = self.inner.epoch.lock();
            *epoch += 1;
            self.inner.persist(&token, &identity);
            self.inner
                .state
                .send_replace(Session::authenticated(token.clone(), identity.clone()));
            *epoch
        };

        info!(user_id = identity.id(), role = %identity.role(), "Signed in");

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                debug!("No runtime, skipping identity refresh");
                return None;
            }
        };

        let inner = self.inner.clone();
        Some(handle.spawn(async move { inner.refresh(epoch, token).await }))
    }

    /// Exchange credentials and log in with the result
    ///
    /// On failure nothing changes and the error is returned.
    pub async fn sign_in<A>(
        &self,
        authenticator: &A,
        credentials: &Credentials,
    ) -> Result<Identity, SignInError>
    where
        A: Authenticator + ?Sized,
    {
        let grant = match authenticator.authenticate(credentials).await {
            Ok(grant) => grant,
            Err(e) => {
                warn!(email = %credentials.email, error = %e, "Sign-in failed");
                return Err(e);
            }
        };

        let identity = grant.identity.clone();
        self.login(grant.token, grant.identity);
        Ok(identity)
    }

    /// Drop the session and the persisted record
    ///
    /// Safe to call in any state, any number of times.
    pub fn logout(&self) {
        let previous = {
            let mut epoch = self.inner.epoch.lock();
            *epoch += 1;
            self.inner.clear_store();
            self.inner.state.send_replace(Session::anonymous())
        };

        if previous.is_authenticated() {
            info!(
                user_id = previous.user().map(|u| u.id()).unwrap_or_default(),
                "Signed out"
            );
        } else {
            debug!("Logout with no active session");
        }
    }
}

impl ControllerInner {
    /// Read storage into a tentative session without writing anything
    ///
    /// Prefers the full record, whose token copy then needs rewriting. Falls
    /// back to the bare token when the record is missing or unreadable; an
    /// unreadable record needs removing.
    fn load_tentative(&self) -> (Session, StoreRepair) {
        let mut repair = StoreRepair::Nothing;
        match self.store.read_full() {
            Ok(Some(record)) => {
                debug!(user_id = record.user.id(), "Loaded stored session record");
                let repair = StoreRepair::RewriteToken(record.token.clone());
                return (Session::tentative(record.token, Some(record.user)), repair);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Discarding unreadable session record");
                repair = StoreRepair::DiscardRecord;
            }
        }

        let tentative = match self.store.read_token() {
            Ok(Some(token)) => {
                debug!("Found stored token without a session record");
                Session::tentative(token, None)
            }
            Ok(None) => Session::hydrating(),
            Err(e) => {
                warn!(error = %e, "Failed to read stored token");
                Session::hydrating()
            }
        };
        (tentative, repair)
    }

    fn repair(&self, repair: StoreRepair) {
        let result = match &repair {
            StoreRepair::Nothing => return,
            StoreRepair::RewriteToken(token) => self.store.write_token(token),
            StoreRepair::DiscardRecord => self.store.discard_full(),
        };
        if let Err(e) = result {
            warn!(error = %e, repair = ?repair, "Failed to repair stored session");
        }
    }

    /// Run `update` and publish its result, unless the epoch has moved on
    ///
    /// The epoch lock is held while `update` runs, storage writes included,
    /// so a `login` or `logout` cannot land between the check and the write.
    /// With `FileStore` this blocks the calling thread for one small file
    /// write; sessions are a single operator's state, and that cost is
    /// accepted over a window where a late write could outlive a logout.
    fn apply<F>(&self, epoch: u64, update: F)
    where
        F: FnOnce(&ControllerInner) -> Session,
    {
        let current = self.epoch.lock();
        if *current != epoch {
            debug!(started = epoch, current = *current, "Dropping superseded session update");
            return;
        }

        let next = update(self);
        self.state.send_replace(next);
    }

    async fn refresh(&self, epoch: u64, token: AccessToken) {
        match self.fetcher.who_am_i(&token).await {
            Ok(identity) => {
                self.apply(epoch, |inner| {
                    debug!(user_id = identity.id(), "Refreshed identity");
                    inner.persist(&token, &identity);
                    Session::authenticated(token, identity)
                });
            }
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "Identity refresh failed, keeping login");
            }
        }
    }

    fn persist(&self, token: &AccessToken, identity: &Identity) {
        let record = PersistedRecord {
            token: token.clone(),
            user: identity.clone(),
        };
        if let Err(e) = self.store.write_full(&record) {
            warn!(error = %e, "Failed to persist session record");
        }
        if let Err(e) = self.store.write_token(token) {
            warn!(error = %e, "Failed to persist token");
        }
    }

    fn clear_store(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear persisted session");
        }
    }
}
