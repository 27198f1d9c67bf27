//! Integration tests for the session lifecycle
//!
//! Controllers run against stub identity fetchers, in-memory and file-backed
//! stores, and a small axum server standing in for the fleet API.

use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use fleetdesk::auth::{AccessToken, Identity, Role, RoleSet};
use fleetdesk::gate::{self, GateOutcome, LOGIN_ROUTE};
use fleetdesk::nav::{NavShell, Route};
use fleetdesk::session::{
    Credentials, FetchError, FleetApi, HydrationPolicy, IdentityFetcher, Session,
    SessionController, SessionStatus, SignInError,
};
use fleetdesk::storage::{FileStore, KeyValueStore, MemoryStore, PersistedRecord, SessionStore};
use fleetdesk::storage::{StorageError, AUTH_KEY, TOKEN_KEY};
use fleetdesk::transport::AuthorizedClient;
use fleetdesk_client::{ClientConfig, FleetClient};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::timeout;

// Stub fetcher

/// Pauses a fetch until the test lets it continue
#[derive(Default)]
struct Hold {
    entered: Notify,
    release: Notify,
}

#[derive(Default)]
struct StubFetcher {
    answers: HashMap<String, Result<Identity, FetchError>>,
    hold: Option<Arc<Hold>>,
    calls: AtomicUsize,
}

impl StubFetcher {
    fn new() -> Self {
        Self::default()
    }

    fn answer(mut self, token: &str, result: Result<Identity, FetchError>) -> Self {
        self.answers.insert(token.to_string(), result);
        self
    }

    fn held(mut self, hold: Arc<Hold>) -> Self {
        self.hold = Some(hold);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityFetcher for StubFetcher {
    async fn who_am_i(&self, token: &AccessToken) -> Result<Identity, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hold) = &self.hold {
            hold.entered.notify_one();
            hold.release.notified().await;
        }
        self.answers
            .get(token.as_str())
            .cloned()
            .unwrap_or_else(|| Err(FetchError::Unauthorized("unknown token".into())))
    }
}

fn token(s: &str) -> AccessToken {
    AccessToken::new(s).unwrap()
}

fn identity(id: &str, role: Role) -> Identity {
    Identity::new(id, format!("user{}@fleet.test", id), role).unwrap()
}

fn seeded_store(tok: &str, user: Identity) -> SessionStore {
    let store = SessionStore::in_memory();
    store
        .write_full(&PersistedRecord {
            token: token(tok),
            user,
        })
        .unwrap();
    store.write_token(&token(tok)).unwrap();
    store
}

fn assert_invariant(session: &Session) {
    let both = session.token().is_some() && session.user().is_some();
    let neither = session.token().is_none() && session.user().is_none();
    match session.status() {
        SessionStatus::Authenticated => assert!(both),
        SessionStatus::Anonymous => assert!(neither),
        SessionStatus::Hydrating => panic!("session still hydrating"),
    }
}

// Hydration scenarios

#[tokio::test]
async fn test_hydrate_without_record_is_anonymous() {
    let fetcher = Arc::new(StubFetcher::new());
    let controller = SessionController::new(SessionStore::in_memory(), fetcher.clone());

    let session = controller.hydrate().await;

    assert_eq!(session.status(), SessionStatus::Anonymous);
    assert_eq!(gate::evaluate(&session, None), GateOutcome::Redirect(LOGIN_ROUTE));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_hydrate_valid_record_verifies_identity() {
    let viewer = identity("1", Role::Viewer);
    let store = seeded_store("abc", viewer.clone());
    let fetcher = Arc::new(StubFetcher::new().answer("abc", Ok(viewer.clone())));
    let controller = SessionController::new(store, fetcher);

    let session = controller.hydrate().await;

    assert_eq!(session, Session::authenticated(token("abc"), viewer));
    let admins = RoleSet::of(&[Role::Admin]);
    assert_eq!(gate::evaluate(&session, Some(&admins)), GateOutcome::Deny);
    assert_eq!(gate::evaluate(&session, None), GateOutcome::Allow);
}

#[tokio::test]
async fn test_hydrate_corrupt_record_heals_from_token() {
    let backend = Arc::new(MemoryStore::new());
    backend.set(AUTH_KEY, "{\"token\": \"xyz\", \"user\": ").unwrap();
    backend.set(TOKEN_KEY, "xyz").unwrap();
    let store = SessionStore::new(backend.clone());

    let editor = identity("3", Role::Editor);
    let fetcher = Arc::new(StubFetcher::new().answer("xyz", Ok(editor.clone())));
    let controller = SessionController::new(store.clone(), fetcher);

    let session = controller.hydrate().await;

    assert_eq!(session, Session::authenticated(token("xyz"), editor.clone()));
    assert_eq!(
        store.read_full().unwrap(),
        Some(PersistedRecord {
            token: token("xyz"),
            user: editor,
        })
    );
    let raw: Value = serde_json::from_str(&backend.get(AUTH_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(raw["user"]["role"], json!({"name": "Editor"}));
}

#[tokio::test]
async fn test_hydrate_transport_failure_keeps_stored_identity() {
    let viewer = identity("1", Role::Viewer);
    let store = seeded_store("abc", viewer.clone());
    let fetcher = Arc::new(
        StubFetcher::new().answer("abc", Err(FetchError::Transport("connection refused".into()))),
    );
    let controller = SessionController::new(store.clone(), fetcher);

    let session = controller.hydrate().await;

    assert_eq!(session, Session::authenticated(token("abc"), viewer));
    assert!(store.read_full().unwrap().is_some());
}

#[tokio::test]
async fn test_login_logout_then_hydrate_is_anonymous() {
    let fetcher = Arc::new(StubFetcher::new().answer("t1", Ok(identity("1", Role::Admin))));
    let controller = SessionController::new(SessionStore::in_memory(), fetcher);

    controller.login(token("t1"), identity("1", Role::Admin));
    controller.logout();
    let session = controller.hydrate().await;

    assert_eq!(session.status(), SessionStatus::Anonymous);
}

#[tokio::test]
async fn test_hydrate_tolerates_rejected_token_by_default() {
    let editor = identity("2", Role::Editor);
    let store = seeded_store("stale", editor.clone());
    let controller = SessionController::new(store.clone(), Arc::new(StubFetcher::new()));

    let session = controller.hydrate().await;

    assert_eq!(session, Session::authenticated(token("stale"), editor));
    assert_eq!(store.read_token().unwrap(), Some(token("stale")));
}

#[tokio::test]
async fn test_strict_policy_signs_out_rejected_token() {
    let store = seeded_store("stale", identity("2", Role::Editor));
    let controller = SessionController::with_policy(
        store.clone(),
        Arc::new(StubFetcher::new()),
        HydrationPolicy::ForceLogoutOnUnauthorized,
    );

    let session = controller.hydrate().await;

    assert_eq!(session, Session::anonymous());
    assert!(store.read_full().unwrap().is_none());
    assert!(store.read_token().unwrap().is_none());
}

#[tokio::test]
async fn test_strict_policy_tolerates_transport_failure() {
    let editor = identity("2", Role::Editor);
    let store = seeded_store("abc", editor.clone());
    let fetcher =
        Arc::new(StubFetcher::new().answer("abc", Err(FetchError::Transport("timeout".into()))));
    let controller = SessionController::with_policy(
        store,
        fetcher,
        HydrationPolicy::ForceLogoutOnUnauthorized,
    );

    assert_eq!(
        controller.hydrate().await,
        Session::authenticated(token("abc"), editor)
    );
}

#[tokio::test]
async fn test_bare_token_with_failed_lookup_is_anonymous() {
    let store = SessionStore::in_memory();
    store.write_token(&token("orphan")).unwrap();
    let fetcher = Arc::new(
        StubFetcher::new().answer("orphan", Err(FetchError::Transport("offline".into()))),
    );
    let controller = SessionController::new(store.clone(), fetcher);

    let session = controller.hydrate().await;

    assert_invariant(&session);
    assert_eq!(session.status(), SessionStatus::Anonymous);
    // Kept for the next start to retry
    assert_eq!(store.read_token().unwrap(), Some(token("orphan")));
}

#[tokio::test]
async fn test_hydrate_rewrites_missing_token_copy() {
    let backend = Arc::new(MemoryStore::new());
    let store = SessionStore::new(backend.clone());
    let viewer = identity("1", Role::Viewer);
    store
        .write_full(&PersistedRecord {
            token: token("abc"),
            user: viewer.clone(),
        })
        .unwrap();
    assert_eq!(backend.get(TOKEN_KEY).unwrap(), None);

    // A failed lookup skips the full rewrite, leaving only the token repair
    let fetcher =
        Arc::new(StubFetcher::new().answer("abc", Err(FetchError::Transport("offline".into()))));
    let controller = SessionController::new(store.clone(), fetcher);

    let session = controller.hydrate().await;

    assert_eq!(session, Session::authenticated(token("abc"), viewer));
    assert_eq!(store.read_token().unwrap(), Some(token("abc")));
}

#[tokio::test]
async fn test_hydrate_after_login_keeps_login() {
    let store = seeded_store("stale", identity("2", Role::Viewer));
    let admin = identity("1", Role::Admin);
    let fetcher = Arc::new(StubFetcher::new());
    let controller = SessionController::with_policy(
        store.clone(),
        fetcher.clone(),
        HydrationPolicy::ForceLogoutOnUnauthorized,
    );

    let refresh = controller.login(token("fresh"), admin.clone()).unwrap();
    let session = controller.hydrate().await;
    refresh.await.unwrap();

    assert_eq!(session, Session::authenticated(token("fresh"), admin.clone()));
    assert_eq!(gate::evaluate(&session, None), GateOutcome::Allow);
    assert_eq!(controller.current_session(), session);
    assert_eq!(store.read_token().unwrap(), Some(token("fresh")));
    assert_eq!(store.read_full().unwrap().unwrap().user, admin);
    // Only the login refresh reached the fetcher
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_hydrating_gate_is_pending_until_fetch_returns() {
    let hold = Arc::new(Hold::default());
    let viewer = identity("1", Role::Viewer);
    let fetcher = Arc::new(
        StubFetcher::new()
            .answer("abc", Ok(viewer.clone()))
            .held(hold.clone()),
    );
    let controller = SessionController::new(seeded_store("abc", viewer), fetcher);

    let task = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.hydrate().await })
    };
    hold.entered.notified().await;

    let session = controller.current_session();
    assert!(session.is_hydrating());
    assert_eq!(gate::evaluate(&session, None), GateOutcome::Pending);
    assert!(NavShell::from_session(&session).is_none());

    hold.release.notify_one();
    let session = task.await.unwrap();
    assert_eq!(gate::evaluate(&session, None), GateOutcome::Allow);
}

// Races with login and logout

/// Backend that signs the operator out right after the session record is read
#[derive(Default)]
struct LogoutOnRecordRead {
    inner: MemoryStore,
    controller: OnceLock<SessionController>,
    fired: AtomicBool,
}

impl KeyValueStore for LogoutOnRecordRead {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self.inner.get(key)?;
        if key == AUTH_KEY && !self.fired.swap(true, Ordering::SeqCst) {
            if let Some(controller) = self.controller.get() {
                controller.logout();
            }
        }
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.inner.set(key, value)
    }

    fn remove(&self, keys: &[&str]) -> Result<(), StorageError> {
        self.inner.remove(keys)
    }
}

#[tokio::test]
async fn test_logout_while_loading_record_leaves_storage_empty() {
    let backend = Arc::new(LogoutOnRecordRead::default());
    let store = SessionStore::new(backend.clone());
    let admin = identity("1", Role::Admin);
    store
        .write_full(&PersistedRecord {
            token: token("abc"),
            user: admin.clone(),
        })
        .unwrap();

    let fetcher = Arc::new(StubFetcher::new().answer("abc", Ok(admin)));
    let controller = SessionController::new(store.clone(), fetcher);
    assert!(backend.controller.set(controller.clone()).is_ok());

    let session = controller.hydrate().await;

    assert!(backend.fired.load(Ordering::SeqCst));
    assert_eq!(session, Session::anonymous());
    assert!(store.read_full().unwrap().is_none());
    assert!(store.read_token().unwrap().is_none());

    // A restart finds nothing to restore
    let restarted = SessionController::new(store, Arc::new(StubFetcher::new()));
    assert_eq!(restarted.hydrate().await, Session::anonymous());
}

#[tokio::test]
async fn test_logout_during_hydration_wins() {
    let hold = Arc::new(Hold::default());
    let admin = identity("1", Role::Admin);
    let store = seeded_store("abc", admin.clone());
    let fetcher = Arc::new(StubFetcher::new().answer("abc", Ok(admin)).held(hold.clone()));
    let controller = SessionController::new(store.clone(), fetcher);

    let task = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.hydrate().await })
    };
    hold.entered.notified().await;
    controller.logout();
    hold.release.notify_one();
    task.await.unwrap();

    assert_eq!(controller.current_session(), Session::anonymous());
    // The late lookup must not rewrite the record
    assert!(store.read_full().unwrap().is_none());
    assert!(store.read_token().unwrap().is_none());
}

#[tokio::test]
async fn test_login_during_hydration_wins() {
    let hold = Arc::new(Hold::default());
    let old = identity("1", Role::Viewer);
    let new = identity("2", Role::Admin);
    let store = seeded_store("old", old.clone());
    let fetcher = Arc::new(
        StubFetcher::new()
            .answer("old", Ok(old))
            .answer("new", Ok(new.clone()))
            .held(hold.clone()),
    );
    let controller = SessionController::new(store.clone(), fetcher);

    let task = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.hydrate().await })
    };
    hold.entered.notified().await;
    let refresh = controller.login(token("new"), new.clone()).unwrap();

    // Let both held lookups finish
    hold.release.notify_one();
    task.await.unwrap();
    hold.release.notify_one();
    refresh.await.unwrap();

    assert_eq!(
        controller.current_session(),
        Session::authenticated(token("new"), new.clone())
    );
    assert_eq!(store.read_full().unwrap().unwrap().user, new);
}

#[tokio::test]
async fn test_login_refresh_replaces_identity() {
    let stale = identity("4", Role::Viewer);
    let fresh = identity("4", Role::Editor);
    let store = SessionStore::in_memory();
    let fetcher = Arc::new(StubFetcher::new().answer("t1", Ok(fresh.clone())));
    let controller = SessionController::new(store.clone(), fetcher);

    let refresh = controller.login(token("t1"), stale.clone()).unwrap();
    assert_eq!(controller.current_session().user(), Some(&stale));

    refresh.await.unwrap();

    assert_eq!(controller.current_session(), Session::authenticated(token("t1"), fresh.clone()));
    assert_eq!(store.read_full().unwrap().unwrap().user, fresh);
}

#[tokio::test]
async fn test_logout_cancels_pending_refresh() {
    let hold = Arc::new(Hold::default());
    let fetcher = Arc::new(
        StubFetcher::new()
            .answer("t1", Ok(identity("1", Role::Admin)))
            .held(hold.clone()),
    );
    let store = SessionStore::in_memory();
    let controller = SessionController::new(store.clone(), fetcher);

    let refresh = controller.login(token("t1"), identity("1", Role::Admin)).unwrap();
    hold.entered.notified().await;
    controller.logout();
    hold.release.notify_one();
    refresh.await.unwrap();

    assert_eq!(controller.current_session(), Session::anonymous());
    assert!(store.read_full().unwrap().is_none());
}

#[tokio::test]
async fn test_subscribers_see_transitions() {
    let fetcher = Arc::new(StubFetcher::new().answer("t1", Err(FetchError::Transport("x".into()))));
    let controller = SessionController::new(SessionStore::in_memory(), fetcher);
    let mut rx = controller.subscribe();

    controller.hydrate().await;
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().status(), SessionStatus::Anonymous);

    controller.login(token("t1"), identity("1", Role::Editor));
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update().status(), SessionStatus::Authenticated);
}

// Persistence round trips

#[tokio::test]
async fn test_login_then_reload_restores_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let user = identity("9", Role::Admin);
    let fetcher = Arc::new(StubFetcher::new().answer("t9", Ok(user.clone())));

    let first = SessionController::new(
        SessionStore::new(Arc::new(FileStore::new(&path))),
        fetcher.clone(),
    );
    first.hydrate().await;
    if let Some(refresh) = first.login(token("t9"), user.clone()) {
        refresh.await.unwrap();
    }

    // Simulated restart
    let second = SessionController::new(
        SessionStore::new(Arc::new(FileStore::new(&path))),
        fetcher,
    );
    let session = second.hydrate().await;

    assert_eq!(session, Session::authenticated(token("t9"), user));
}

#[tokio::test]
async fn test_logout_clears_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let store = SessionStore::new(Arc::new(FileStore::new(&path)));
    let fetcher = Arc::new(StubFetcher::new());
    let controller = SessionController::new(store.clone(), fetcher);

    controller.login(token("t1"), identity("1", Role::Viewer));
    controller.logout();
    let once = controller.current_session();
    controller.logout();

    assert_eq!(controller.current_session(), once);
    assert_eq!(once, Session::anonymous());
    assert!(store.read_full().unwrap().is_none());
    assert!(store.read_token().unwrap().is_none());
}

#[tokio::test]
async fn test_unreadable_state_file_is_no_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "not json at all").unwrap();
    let fetcher = Arc::new(StubFetcher::new());
    let controller = SessionController::new(
        SessionStore::new(Arc::new(FileStore::new(&path))),
        fetcher.clone(),
    );

    let session = controller.hydrate().await;

    assert_eq!(session, Session::anonymous());
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_unrecognized_role_is_denied_everywhere() {
    let odd = identity("5", Role::parse("Dispatcher"));
    let fetcher = Arc::new(StubFetcher::new().answer("t5", Ok(odd.clone())));
    let store = seeded_store("t5", odd);
    let controller = SessionController::new(store, fetcher);

    let session = controller.hydrate().await;

    assert!(session.is_authenticated());
    assert_eq!(gate::evaluate_route(&session, &Route::Users), GateOutcome::Deny);
    assert_eq!(gate::evaluate_route(&session, &Route::NewVehicle), GateOutcome::Deny);
    assert_eq!(gate::evaluate_route(&session, &Route::Vehicles), GateOutcome::Allow);
}

#[tokio::test]
async fn test_nav_shell_logout() {
    let admin = identity("1", Role::Admin);
    let store = SessionStore::in_memory();
    let controller = SessionController::new(store.clone(), Arc::new(StubFetcher::new()));
    controller.login(token("t1"), admin);

    let shell = NavShell::from_session(&controller.current_session()).unwrap();
    assert_eq!(shell.items.len(), 3);

    assert_eq!(shell.logout(&controller), Route::Login);
    assert_eq!(controller.current_session(), Session::anonymous());
    assert!(store.read_token().unwrap().is_none());
}

// Against a stub fleet API

async fn graphql(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    let query = body["query"].as_str().unwrap_or_default();
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if query.contains("mutation Login") {
        let vars = &body["variables"];
        if vars["email"] == "ops@fleet.test" && vars["password"] == "secret-pass" {
            return Json(json!({"data": {"login": {
                "token": "srv-token",
                "user": {"id": 12, "email": "ops@fleet.test", "role": {"name": "Editor"}}
            }}}));
        }
        return Json(json!({"data": null, "errors": [{"message": "invalid credentials"}]}));
    }

    if query.contains("query Me") {
        if auth.as_deref() == Some("Bearer srv-token") {
            return Json(json!({"data": {"me":
                {"id": "12", "email": "ops@fleet.test", "role": {"name": "Editor"}}}}));
        }
        return Json(json!({"data": {"me": null}, "errors": [{"message": "unauthorized"}]}));
    }

    Json(json!({"data": {"echoAuth": auth}}))
}

async fn spawn_api() -> FleetClient {
    let app = Router::new().route("/query", post(graphql));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FleetClient::new(ClientConfig::new(format!("http://{}/query", addr))).unwrap()
}

#[tokio::test]
async fn test_sign_in_against_api() {
    let client = spawn_api().await;
    let api = FleetApi::new(client);
    let store = SessionStore::in_memory();
    let controller = SessionController::new(store.clone(), Arc::new(api.clone()));
    controller.hydrate().await;

    let who = controller
        .sign_in(&api, &Credentials::new("ops@fleet.test", "secret-pass"))
        .await
        .unwrap();

    assert_eq!(who.id(), "12");
    assert_eq!(who.role(), &Role::Editor);
    assert!(controller.current_session().is_authenticated());
    assert_eq!(store.read_token().unwrap(), Some(token("srv-token")));
}

#[tokio::test]
async fn test_sign_in_bad_password_against_api() {
    let api = FleetApi::new(spawn_api().await);
    let store = SessionStore::in_memory();
    let controller = SessionController::new(store.clone(), Arc::new(api.clone()));
    controller.hydrate().await;

    let err = controller
        .sign_in(&api, &Credentials::new("ops@fleet.test", "nope"))
        .await
        .unwrap_err();

    assert!(matches!(err, SignInError::InvalidCredentials(_)));
    assert_eq!(controller.current_session(), Session::anonymous());
    assert!(store.read_token().unwrap().is_none());
}

#[tokio::test]
async fn test_hydrate_against_api_rejects_unknown_token() {
    let api = FleetApi::new(spawn_api().await);
    let store = SessionStore::in_memory();
    store.write_token(&token("forged")).unwrap();
    let controller = SessionController::with_policy(
        store.clone(),
        Arc::new(api),
        HydrationPolicy::ForceLogoutOnUnauthorized,
    );

    let session = timeout(Duration::from_secs(5), controller.hydrate())
        .await
        .unwrap();

    assert_eq!(session, Session::anonymous());
    assert!(store.read_token().unwrap().is_none());
}

#[tokio::test]
async fn test_authorized_client_follows_session() {
    let client = spawn_api().await;
    let controller = SessionController::new(
        SessionStore::in_memory(),
        Arc::new(FleetApi::new(client.clone())),
    );
    controller.hydrate().await;
    let authorized = AuthorizedClient::new(client, controller.clone());

    let echo = |v: Value| v["echoAuth"].clone();

    let data: Value = authorized.execute::<Value, _>("{ echoAuth }", None).await.unwrap();
    assert_eq!(echo(data), Value::Null);

    controller.login(token("srv-token"), identity("12", Role::Editor));
    let data: Value = authorized.execute::<Value, _>("{ echoAuth }", None).await.unwrap();
    assert_eq!(echo(data), json!("Bearer srv-token"));

    controller.logout();
    let data: Value = authorized.execute::<Value, _>("{ echoAuth }", None).await.unwrap();
    assert_eq!(echo(data), Value::Null);
}
