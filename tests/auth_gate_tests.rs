mod common;

use async_trait::async_trait;
use axum::http::{StatusCode, header};
use chrono::{DateTime, Duration, Utc};
use common::{PASSWORD, TestApp, get, json};
use fennec_backend::{
    AppError,
    auth::{AuthGate, AuthState},
    models::Role,
    repository::Repository,
    session::{MemorySessionStore, SessionError, SessionRecord, SessionState, SessionStore},
};
use std::sync::Arc;
use tower::util::ServiceExt;

fn gate(app: &TestApp) -> AuthGate {
    AuthGate::new(
        app.state.repo.clone(),
        app.state.sessions.clone(),
        app.state.config.session_ttl(),
    )
}

/// Session store whose every operation fails, standing in for an unreachable database.
struct BrokenSessions;

#[async_trait]
impl SessionStore for BrokenSessions {
    async fn create(&self, _record: &SessionRecord) -> Result<(), SessionError> {
        Err(SessionError::Unavailable("down".into()))
    }
    async fn load(&self, _token: &str) -> Result<Option<SessionRecord>, SessionError> {
        Err(SessionError::Unavailable("down".into()))
    }
    async fn touch(&self, _token: &str, _at: DateTime<Utc>) -> Result<(), SessionError> {
        Err(SessionError::Unavailable("down".into()))
    }
    async fn destroy(&self, _token: &str) -> Result<(), SessionError> {
        Err(SessionError::Unavailable("down".into()))
    }
    async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<u64, SessionError> {
        Err(SessionError::Unavailable("down".into()))
    }
}

#[tokio::test]
async fn test_authenticate_rejects_unknown_user_and_wrong_password_alike() {
    let app = TestApp::new();
    app.seed_user("coach", Role::Editor).await;
    let gate = gate(&app);

    let unknown = gate.authenticate("nobody", PASSWORD).await.unwrap_err();
    let wrong = gate.authenticate("coach", "not-the-password").await.unwrap_err();

    assert!(matches!(unknown, AppError::InvalidCredentials));
    assert!(matches!(wrong, AppError::InvalidCredentials));
    assert_eq!(unknown.to_string(), wrong.to_string());
}

#[tokio::test]
async fn test_authenticate_then_check_session() {
    let app = TestApp::new();
    let user = app.seed_user("coach", Role::Editor).await;
    let gate = gate(&app);

    let (session, returned) = gate.authenticate("coach", PASSWORD).await.unwrap();
    assert_eq!(returned.id, user.id);

    match gate.check_session(Some(&session.token)).await.unwrap() {
        AuthState::Authenticated(snapshot) => {
            assert_eq!(snapshot.user_id, user.id);
            assert_eq!(snapshot.role, Role::Editor);
        }
        AuthState::Anonymous => panic!("fresh session should be live"),
    }
}

#[tokio::test]
async fn test_never_issued_and_destroyed_tokens_are_anonymous() {
    let app = TestApp::new();
    app.seed_user("coach", Role::Editor).await;
    let gate = gate(&app);

    assert_eq!(gate.check_session(None).await.unwrap(), AuthState::Anonymous);
    assert_eq!(
        gate.check_session(Some("never-issued")).await.unwrap(),
        AuthState::Anonymous
    );

    let (session, _) = gate.authenticate("coach", PASSWORD).await.unwrap();
    gate.logout(Some(&session.token)).await.unwrap();
    // Logging out twice is fine.
    gate.logout(Some(&session.token)).await.unwrap();
    assert_eq!(
        gate.check_session(Some(&session.token)).await.unwrap(),
        AuthState::Anonymous
    );

    let (status, body) = app
        .send(get("/api/auth/me", Some(&app.cookie(&session.token))))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_expired_session_is_anonymous_and_removed() {
    let app = TestApp::new();
    let user = app.seed_user("coach", Role::Editor).await;
    app.sessions
        .create(&SessionRecord {
            token: "stale".into(),
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
            expires_at: Utc::now() - Duration::minutes(1),
        })
        .await
        .unwrap();

    let gate = gate(&app);
    assert_eq!(gate.check_session(Some("stale")).await.unwrap(), AuthState::Anonymous);
    assert!(app.sessions.load("stale").await.unwrap().is_none());
}

#[tokio::test]
async fn test_check_session_slides_expiry() {
    let app = TestApp::new();
    let user = app.seed_user("coach", Role::Editor).await;
    let soon = Utc::now() + Duration::minutes(5);
    app.sessions
        .create(&SessionRecord {
            token: "sliding".into(),
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
            expires_at: soon,
        })
        .await
        .unwrap();

    gate(&app).check_session(Some("sliding")).await.unwrap();
    let record = app.sessions.load("sliding").await.unwrap().unwrap();
    assert!(record.expires_at > soon + Duration::hours(1));
}

#[tokio::test]
async fn test_deleted_user_loses_access() {
    let app = TestApp::new();
    let (user, cookie) = app.editor().await;
    app.repo()
        .delete::<fennec_backend::models::User>(user.id)
        .await
        .unwrap();

    let (status, body) = app.send(get("/api/auth/me", Some(&cookie))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "User no longer exists");
}

#[tokio::test]
async fn test_role_gate() {
    let app = TestApp::new();
    let (_, editor_cookie) = app.editor().await;
    let (_, admin_cookie) = app.admin().await;

    let (anonymous, _) = app.send(get("/api/bookings", None)).await;
    assert_eq!(anonymous, StatusCode::UNAUTHORIZED);

    let (editor, body) = app.send(get("/api/bookings", Some(&editor_cookie))).await;
    assert_eq!(editor, StatusCode::FORBIDDEN);
    assert_eq!(
        body["message"],
        "User role editor is not authorized to access this route"
    );

    let (admin, body) = app.send(get("/api/bookings", Some(&admin_cookie))).await;
    assert_eq!(admin, StatusCode::OK);
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_session_store_failure_is_server_error() {
    let app = TestApp::new();
    let mut state = app.state.clone();
    state.sessions = Arc::new(BrokenSessions) as SessionState;
    let router = fennec_backend::create_router(state);

    let request = get("/api/auth/me", Some("fennec_sid=anything"));
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_login_sets_http_only_cookie_and_logout_clears_it() {
    let app = TestApp::new();
    app.seed_user("coach", Role::Editor).await;

    let response = app
        .router()
        .oneshot(json(
            "POST",
            "/api/auth/login",
            None,
            serde_json::json!({ "username": "coach", "password": PASSWORD }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("fennec_sid="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));

    let cookie = set_cookie.split(';').next().unwrap().to_string();
    let (status, body) = app.send(get("/api/auth/check-auth", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["isAuthenticated"], true);
    assert_eq!(body["user"]["username"], "coach");
    assert_eq!(body["user"]["role"], "editor");

    let (status, _) = app.send(get("/api/auth/logout", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.send(get("/api/auth/check-auth", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["isAuthenticated"], false);
    assert!(body.get("user").is_none());
}

#[tokio::test]
async fn test_check_auth_envelope_without_cookie() {
    let app = TestApp::new();
    let (status, body) = app.send(get("/api/auth/check-auth", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({ "success": true, "isAuthenticated": false }));
}

#[tokio::test]
async fn test_login_returns_account_under_user_key() {
    let app = TestApp::new();
    app.seed_user("coach", Role::Editor).await;

    let (status, body) = app
        .send(json(
            "POST",
            "/api/auth/login",
            None,
            serde_json::json!({ "username": "coach", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["username"], "coach");
    assert_eq!(body["user"]["email"], "coach@fennecfc.com");
    assert_eq!(body["user"]["role"], "editor");
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn test_login_with_bad_credentials() {
    let app = TestApp::new();
    app.seed_user("coach", Role::Editor).await;

    let (status, body) = app
        .send(json(
            "POST",
            "/api/auth/login",
            None,
            serde_json::json!({ "username": "coach", "password": "wrong-one" }),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");
}

#[tokio::test]
async fn test_memory_session_purge() {
    let sessions = MemorySessionStore::new();
    let now = Utc::now();
    for (token, offset) in [("old", -10), ("new", 10)] {
        sessions
            .create(&SessionRecord {
                token: token.into(),
                user_id: uuid::Uuid::new_v4(),
                username: token.into(),
                role: Role::Editor,
                expires_at: now + Duration::minutes(offset),
            })
            .await
            .unwrap();
    }

    assert_eq!(sessions.purge_expired(now).await.unwrap(), 1);
    assert!(sessions.load("new").await.unwrap().is_some());
    let _ = Repository::in_memory();
}
