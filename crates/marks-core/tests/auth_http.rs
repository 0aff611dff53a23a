use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use url::Url;

use marks_core::auth::{
    AuthError, AuthSession, MemorySessionStore, OAuthProvider, PkcePair, RedirectLauncher,
    SessionPersistence, SupabaseAuth, SupabaseAuthClient,
};
use marks_core::backend::{AccessTokenSource, AuthService};
use marks_core::config::ClientConfig;
use marks_core::util::unix_timestamp_now;
use marks_core::Identity;

const RETURN_URL: &str = "http://127.0.0.1:8976/callback";

#[derive(Debug, Clone)]
struct Seen {
    path: &'static str,
    query: HashMap<String, String>,
    apikey: Option<String>,
    authorization: Option<String>,
    body: Value,
}

type Log = Arc<Mutex<Vec<Seen>>>;

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

fn record(
    log: &Log,
    path: &'static str,
    query: HashMap<String, String>,
    headers: &HeaderMap,
    body: Value,
) {
    log.lock().unwrap().push(Seen {
        path,
        query,
        apikey: header(headers, "apikey"),
        authorization: header(headers, "authorization"),
        body,
    });
}

fn seen(log: &Log, path: &str) -> Vec<Seen> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|seen| seen.path == path)
        .cloned()
        .collect()
}

fn session_body(access_token: &str, refresh_token: &str, expires_in: i64) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": expires_in,
        "refresh_token": refresh_token,
        "user": {"id": "user-1", "email": "ada@example.com"}
    })
}

async fn token(
    State(log): State<Log>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let grant_type = query.get("grant_type").cloned().unwrap_or_default();
    record(&log, "/token", query, &headers, body.clone());

    match grant_type.as_str() {
        // A code whose session comes back already expired and cannot be refreshed.
        "pkce" if body["auth_code"] == "stale-code" => {
            Json(session_body("stale-access", "bad-refresh", 0)).into_response()
        }
        "pkce" => Json(session_body("access-1", "refresh-1", 3600)).into_response(),
        "refresh_token" if body["refresh_token"] == "bad-refresh" => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid Refresh Token: Refresh Token Not Found"
            })),
        )
            .into_response(),
        "refresh_token" => Json(session_body("access-2", "refresh-2", 3600)).into_response(),
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn user(State(log): State<Log>, headers: HeaderMap) -> Response {
    record(&log, "/user", HashMap::new(), &headers, Value::Null);
    match header(&headers, "authorization").as_deref() {
        Some("Bearer expired-token") => StatusCode::UNAUTHORIZED.into_response(),
        Some("Bearer revoked-token") => StatusCode::FORBIDDEN.into_response(),
        _ => Json(json!({"id": "user-1", "email": "ada@example.com"})).into_response(),
    }
}

async fn logout(State(log): State<Log>, headers: HeaderMap) -> StatusCode {
    record(&log, "/logout", HashMap::new(), &headers, Value::Null);
    if header(&headers, "authorization").as_deref() == Some("Bearer expired-token") {
        StatusCode::UNAUTHORIZED
    } else {
        StatusCode::NO_CONTENT
    }
}

async fn serve() -> (SocketAddr, Log) {
    let log = Log::default();
    let router = Router::new()
        .route("/auth/v1/token", post(token))
        .route("/auth/v1/user", get(user))
        .route("/auth/v1/logout", post(logout))
        .with_state(Arc::clone(&log));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, log)
}

fn config(addr: SocketAddr) -> ClientConfig {
    ClientConfig::new(format!("http://{addr}"), "anon-key").unwrap()
}

fn ada() -> Identity {
    Identity::new("user-1", Some("ada@example.com".to_string()))
}

fn stored_session(access_token: &str, refresh_token: &str, expires_at: i64) -> AuthSession {
    AuthSession {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.to_string(),
        expires_at,
        user: ada(),
    }
}

struct AcceptingLauncher;

impl RedirectLauncher for AcceptingLauncher {
    fn launch(&self, _url: &Url) -> Result<(), String> {
        Ok(())
    }
}

async fn signed_in_service(
    addr: SocketAddr,
    auth_code: &str,
) -> (SupabaseAuth<MemorySessionStore>, MemorySessionStore) {
    let store = MemorySessionStore::default();
    let auth = SupabaseAuth::new(&config(addr), store.clone(), Arc::new(AcceptingLauncher)).unwrap();
    auth.begin_oauth_redirect(OAuthProvider::Github, RETURN_URL)
        .await
        .unwrap();
    auth.complete_oauth_redirect(auth_code).await.unwrap();
    (auth, store)
}

#[tokio::test]
async fn exchange_code_posts_pkce_grant_and_saves_session() {
    let (addr, log) = serve().await;
    let store = MemorySessionStore::default();
    let client = SupabaseAuthClient::new(&config(addr), store.clone()).unwrap();
    let pkce = PkcePair::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");

    let session = client.exchange_code(" code-123 ", &pkce).await.unwrap();

    assert_eq!(session.access_token, "access-1");
    assert_eq!(session.user, ada());
    assert!(!session.is_expired());
    assert_eq!(store.load_session().unwrap(), Some(session));

    let seen = seen(&log, "/token");
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen[0].query.get("grant_type").map(String::as_str),
        Some("pkce")
    );
    assert_eq!(
        seen[0].body,
        json!({
            "auth_code": "code-123",
            "code_verifier": "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"
        })
    );
    assert_eq!(seen[0].apikey.as_deref(), Some("anon-key"));
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer anon-key"));
}

#[tokio::test]
async fn empty_auth_code_is_rejected_without_a_request() {
    let (addr, log) = serve().await;
    let client = SupabaseAuthClient::new(&config(addr), MemorySessionStore::default()).unwrap();

    let error = client
        .exchange_code("  ", &PkcePair::generate())
        .await
        .unwrap_err();

    assert!(matches!(error, AuthError::Api(_)));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn refresh_session_posts_refresh_grant_and_saves_session() {
    let (addr, log) = serve().await;
    let store = MemorySessionStore::default();
    let client = SupabaseAuthClient::new(&config(addr), store.clone()).unwrap();

    let session = client.refresh_session("refresh-1").await.unwrap();

    assert_eq!(session.access_token, "access-2");
    assert_eq!(session.refresh_token, "refresh-2");
    assert_eq!(store.load_session().unwrap(), Some(session));

    let seen = seen(&log, "/token");
    assert_eq!(
        seen[0].query.get("grant_type").map(String::as_str),
        Some("refresh_token")
    );
    assert_eq!(seen[0].body, json!({"refresh_token": "refresh-1"}));
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer anon-key"));
}

#[tokio::test]
async fn refresh_failure_surfaces_server_message() {
    let (addr, _log) = serve().await;
    let store = MemorySessionStore::default();
    let client = SupabaseAuthClient::new(&config(addr), store.clone()).unwrap();

    let error = client.refresh_session("bad-refresh").await.unwrap_err();

    assert!(
        matches!(&error, AuthError::Api(message) if message.contains("Invalid Refresh Token")),
        "unexpected error: {error:?}"
    );
    assert_eq!(store.load_session().unwrap(), None);
}

#[tokio::test]
async fn get_user_sends_bearer_and_maps_rejections_to_unauthorized() {
    let (addr, log) = serve().await;
    let client = SupabaseAuthClient::new(&config(addr), MemorySessionStore::default()).unwrap();

    assert_eq!(client.get_user("access-1").await.unwrap(), ada());
    let seen = seen(&log, "/user");
    assert_eq!(seen[0].apikey.as_deref(), Some("anon-key"));
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer access-1"));

    let expired = client.get_user("expired-token").await.unwrap_err();
    assert!(matches!(expired, AuthError::Unauthorized));
    let revoked = client.get_user("revoked-token").await.unwrap_err();
    assert!(matches!(revoked, AuthError::Unauthorized));
}

#[tokio::test]
async fn sign_out_treats_unauthorized_as_success_and_clears_store() {
    let (addr, log) = serve().await;
    let store = MemorySessionStore::with_session(stored_session(
        "expired-token",
        "refresh-1",
        unix_timestamp_now() + 3600,
    ));
    let client = SupabaseAuthClient::new(&config(addr), store.clone()).unwrap();

    client.sign_out("expired-token").await.unwrap();

    assert_eq!(store.load_session().unwrap(), None);
    let seen = seen(&log, "/logout");
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer expired-token"));
}

#[tokio::test]
async fn restore_keeps_a_fresh_session_without_a_request() {
    let (addr, log) = serve().await;
    let session = stored_session("access-1", "refresh-1", unix_timestamp_now() + 3600);
    let store = MemorySessionStore::with_session(session.clone());
    let client = SupabaseAuthClient::new(&config(addr), store).unwrap();

    assert_eq!(client.restore_session().await.unwrap(), Some(session));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn restore_refreshes_a_session_near_expiry() {
    let (addr, log) = serve().await;
    let store = MemorySessionStore::with_session(stored_session(
        "access-1",
        "refresh-1",
        unix_timestamp_now() + 30,
    ));
    let client = SupabaseAuthClient::new(&config(addr), store.clone()).unwrap();

    let Some(restored) = client.restore_session().await.unwrap() else {
        panic!("expected a restored session");
    };

    assert_eq!(restored.access_token, "access-2");
    assert_eq!(store.load_session().unwrap(), Some(restored));
    assert_eq!(seen(&log, "/token")[0].body, json!({"refresh_token": "refresh-1"}));
}

#[tokio::test]
async fn restore_clears_store_when_refresh_fails() {
    let (addr, _log) = serve().await;
    let store = MemorySessionStore::with_session(stored_session("access-1", "bad-refresh", 0));
    let client = SupabaseAuthClient::new(&config(addr), store.clone()).unwrap();

    assert_eq!(client.restore_session().await.unwrap(), None);
    assert_eq!(store.load_session().unwrap(), None);
}

#[tokio::test]
async fn current_identity_signs_out_when_stored_session_cannot_refresh() {
    let (addr, _log) = serve().await;
    let store = MemorySessionStore::with_session(stored_session("access-1", "bad-refresh", 0));
    let auth = SupabaseAuth::new(&config(addr), store.clone(), Arc::new(AcceptingLauncher)).unwrap();

    assert_eq!(auth.current_identity().await.unwrap(), None);
    assert_eq!(store.load_session().unwrap(), None);
}

#[tokio::test]
async fn current_identity_drops_a_stored_session_the_server_rejects() {
    let (addr, _log) = serve().await;
    let store = MemorySessionStore::with_session(stored_session(
        "expired-token",
        "refresh-1",
        unix_timestamp_now() + 3600,
    ));
    let auth = SupabaseAuth::new(&config(addr), store.clone(), Arc::new(AcceptingLauncher)).unwrap();

    assert_eq!(auth.current_identity().await.unwrap(), None);
    assert_eq!(store.load_session().unwrap(), None);
}

#[tokio::test]
async fn redirect_completion_publishes_identity_and_hands_out_token() {
    let (addr, log) = serve().await;
    let store = MemorySessionStore::default();
    let auth = SupabaseAuth::new(&config(addr), store.clone(), Arc::new(AcceptingLauncher)).unwrap();
    let mut changes = auth.on_identity_change();

    auth.begin_oauth_redirect(OAuthProvider::Github, RETURN_URL)
        .await
        .unwrap();
    let identity = auth.complete_oauth_redirect("code-123").await.unwrap();

    assert_eq!(identity, ada());
    assert_eq!(changes.try_recv(), Some(Some(ada())));
    assert_eq!(auth.access_token().await.as_deref(), Some("access-1"));
    assert_eq!(auth.current_identity().await.unwrap(), Some(ada()));
    assert!(store.load_session().unwrap().is_some());
    assert!(seen(&log, "/token")[0].body["code_verifier"].is_string());
}

#[tokio::test]
async fn failed_refresh_of_live_session_publishes_sign_out() {
    let (addr, _log) = serve().await;
    let (auth, store) = signed_in_service(addr, "stale-code").await;
    let mut changes = auth.on_identity_change();

    assert_eq!(auth.access_token().await, None);

    assert_eq!(changes.try_recv(), Some(None));
    assert_eq!(store.load_session().unwrap(), None);
    assert_eq!(auth.current_identity().await.unwrap(), None);
}

#[tokio::test]
async fn end_session_signs_out_and_publishes() {
    let (addr, log) = serve().await;
    let (auth, store) = signed_in_service(addr, "code-123").await;
    let mut changes = auth.on_identity_change();

    auth.end_session().await.unwrap();

    assert_eq!(changes.try_recv(), Some(None));
    assert_eq!(store.load_session().unwrap(), None);
    assert_eq!(auth.access_token().await, None);
    let seen = seen(&log, "/logout");
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer access-1"));
}
