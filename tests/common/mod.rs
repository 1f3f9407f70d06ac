#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use chrono::Utc;
use fennec_backend::{
    AppConfig, AppState, create_router,
    credentials::hash_password,
    mail::{MailerState, MockMailer},
    models::{Role, User},
    query::{Filter, SortKey},
    repository::{Collection, DocumentStore, MemoryStore, Repository, StoreResult},
    session::{MemorySessionStore, SessionRecord, SessionState, SessionStore},
    storage::{MockStorageService, StorageState},
};
use serde_json::Value;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::Notify;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "password123";

/// TestApp
///
/// The full router over in-memory stores, with handles on the mocks so tests
/// can inspect storage and email side effects.
pub struct TestApp {
    pub state: AppState,
    pub storage: Arc<MockStorageService>,
    pub mailer: Arc<MockMailer>,
    pub sessions: Arc<MemorySessionStore>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_mocks(MockStorageService::new(), MockMailer::new())
    }

    pub fn with_mocks(storage: MockStorageService, mailer: MockMailer) -> Self {
        Self::build(Repository::in_memory(), storage, mailer)
    }

    pub fn with_repo(repo: Repository) -> Self {
        Self::build(repo, MockStorageService::new(), MockMailer::new())
    }

    fn build(repo: Repository, storage: MockStorageService, mailer: MockMailer) -> Self {
        let storage = Arc::new(storage);
        let mailer = Arc::new(mailer);
        let sessions = Arc::new(MemorySessionStore::new());
        let state = AppState {
            repo,
            sessions: sessions.clone() as SessionState,
            storage: storage.clone() as StorageState,
            mailer: mailer.clone() as MailerState,
            config: AppConfig::default(),
        };
        Self {
            state,
            storage,
            mailer,
            sessions,
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    pub fn repo(&self) -> &Repository {
        &self.state.repo
    }

    pub async fn seed_user(&self, username: &str, role: Role) -> User {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{username}@fennecfc.com"),
            password_hash: hash_password(PASSWORD).unwrap(),
            role,
            is_verified: true,
            verification_token: None,
            reset_password_token: None,
            reset_password_expire: None,
            created_at: Utc::now(),
        };
        self.repo().insert(&user).await.unwrap();
        user
    }

    /// Opens a session for `user` directly in the store and returns its
    /// `Cookie` header value.
    pub async fn session_for(&self, user: &User) -> String {
        let token = format!("test-token-{}", Uuid::new_v4());
        self.sessions
            .create(&SessionRecord {
                token: token.clone(),
                user_id: user.id,
                username: user.username.clone(),
                role: user.role,
                expires_at: Utc::now() + self.state.config.session_ttl(),
            })
            .await
            .unwrap();
        self.cookie(&token)
    }

    pub fn cookie(&self, token: &str) -> String {
        format!("{}={token}", self.state.config.session_cookie)
    }

    pub async fn editor(&self) -> (User, String) {
        let user = self.seed_user("editor", Role::Editor).await;
        let cookie = self.session_for(&user).await;
        (user, cookie)
    }

    pub async fn admin(&self) -> (User, String) {
        let user = self.seed_user("admin", Role::Admin).await;
        let cookie = self.session_for(&user).await;
        (user, cookie)
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn delete(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("DELETE").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// A single-part multipart body carrying `bytes` as the `image` field.
pub fn image_upload(
    uri: &str,
    cookie: &str,
    file_name: &str,
    content_type: &str,
    bytes: &[u8],
) -> Request<Body> {
    let boundary = "fennec-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("PUT")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// PausingStore
///
/// A memory store that, once armed, holds the next `get` on one collection
/// after reading the document and before returning it. `paused` fires when
/// the read is held; `release` lets it continue. Other calls pass straight
/// through, so a second request can run to completion in between.
pub struct PausingStore {
    inner: MemoryStore,
    collection: Collection,
    armed: AtomicBool,
    pub paused: Notify,
    pub release: Notify,
}

impl PausingStore {
    pub fn new(collection: Collection) -> Self {
        Self {
            inner: MemoryStore::new(),
            collection,
            armed: AtomicBool::new(false),
            paused: Notify::new(),
            release: Notify::new(),
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for PausingStore {
    async fn insert(&self, collection: Collection, id: Uuid, doc: Value) -> StoreResult<()> {
        self.inner.insert(collection, id, doc).await
    }

    async fn replace(&self, collection: Collection, id: Uuid, doc: Value) -> StoreResult<bool> {
        self.inner.replace(collection, id, doc).await
    }

    async fn get(&self, collection: Collection, id: Uuid) -> StoreResult<Option<Value>> {
        let doc = self.inner.get(collection, id).await?;
        if collection == self.collection && self.armed.swap(false, Ordering::SeqCst) {
            self.paused.notify_one();
            self.release.notified().await;
        }
        Ok(doc)
    }

    async fn increment(
        &self,
        collection: Collection,
        id: Uuid,
        field: &str,
        by: i64,
    ) -> StoreResult<Option<Value>> {
        self.inner.increment(collection, id, field, by).await
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> StoreResult<Option<Value>> {
        self.inner.delete(collection, id).await
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        sort: &[SortKey],
        skip: u64,
        limit: Option<u64>,
    ) -> StoreResult<Vec<Value>> {
        self.inner.find(collection, filter, sort, skip, limit).await
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        self.inner.count(collection, filter).await
    }
}
