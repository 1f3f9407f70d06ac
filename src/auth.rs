use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    credentials::{hash_password, random_token, verify_against_decoy, verify_password},
    error::AppError,
    models::{Role, User},
    query::Filter,
    repository::Repository,
    session::{SessionRecord, SessionState},
};

/// SessionSnapshot
///
/// What a live session says about its user at the moment it is checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticated(SessionSnapshot),
}

/// AuthGate
///
/// Session authentication and role checks. Handlers never see it directly;
/// the [`AuthUser`] and [`RequireAdmin`] extractors drive it.
#[derive(Clone)]
pub struct AuthGate {
    repo: Repository,
    sessions: SessionState,
    ttl: Duration,
}

impl AuthGate {
    pub fn new(repo: Repository, sessions: SessionState, ttl: Duration) -> Self {
        Self {
            repo,
            sessions,
            ttl,
        }
    }

    /// authenticate
    ///
    /// Verifies the credentials and opens a session. An unknown username and
    /// a wrong password fail identically.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(SessionRecord, User), AppError> {
        let Some(user) = self
            .repo
            .find_one::<User>(&Filter::new().eq("username", username))
            .await?
        else {
            verify_against_decoy(password);
            return Err(AppError::InvalidCredentials);
        };

        let matches = verify_password(password, &user.password_hash).map_err(|e| {
            AppError::Internal(format!("unreadable password hash for {}: {e}", user.id))
        })?;
        if !matches {
            return Err(AppError::InvalidCredentials);
        }

        let record = SessionRecord {
            token: random_token(),
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
            expires_at: Utc::now() + self.ttl,
        };
        self.sessions.create(&record).await?;
        tracing::info!(user_id = %user.id, "session opened");

        Ok((record, user))
    }

    /// check_session
    ///
    /// Resolves a token to its session, sliding the expiry on success. Absent,
    /// unknown and expired tokens all yield `Anonymous`; only store failures
    /// are errors.
    pub async fn check_session(&self, token: Option<&str>) -> Result<AuthState, AppError> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(AuthState::Anonymous);
        };
        let Some(record) = self.sessions.load(token).await? else {
            return Ok(AuthState::Anonymous);
        };

        let now = Utc::now();
        if record.is_expired(now) {
            self.sessions.destroy(token).await?;
            return Ok(AuthState::Anonymous);
        }
        self.sessions.touch(token, now + self.ttl).await?;

        Ok(AuthState::Authenticated(SessionSnapshot {
            user_id: record.user_id,
            username: record.username,
            role: record.role,
        }))
    }

    /// require_authenticated
    ///
    /// Like `check_session`, but rejects anonymous requests and returns the
    /// user as currently stored rather than the session snapshot.
    pub async fn require_authenticated(&self, token: Option<&str>) -> Result<User, AppError> {
        let AuthState::Authenticated(snapshot) = self.check_session(token).await? else {
            return Err(AppError::Unauthorized(
                "Not authorized to access this route".into(),
            ));
        };
        self.repo
            .get::<User>(snapshot.user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User no longer exists".into()))
    }

    pub fn require_role(user: &User, role: Role) -> Result<(), AppError> {
        if user.role == role {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "User role {} is not authorized to access this route",
                user.role
            )))
        }
    }

    /// Destroys the session behind `token`, if any.
    pub async fn logout(&self, token: Option<&str>) -> Result<(), AppError> {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.sessions.destroy(token).await?;
        }
        Ok(())
    }
}

// --- Cookies ---

pub fn session_cookie(config: &AppConfig, token: String) -> Cookie<'static> {
    Cookie::build((config.session_cookie.clone(), token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(config.is_production())
        .build()
}

pub fn expired_session_cookie(config: &AppConfig) -> Cookie<'static> {
    Cookie::build((config.session_cookie.clone(), ""))
        .path("/")
        .build()
}

fn token_from_parts(parts: &Parts, config: &AppConfig) -> Option<String> {
    CookieJar::from_headers(&parts.headers)
        .get(&config.session_cookie)
        .map(|c| c.value().to_string())
}

// --- Extractors ---

/// SessionToken
///
/// The raw session cookie value, if the request carries one.
#[derive(Debug, Clone)]
pub struct SessionToken(pub Option<String>);

impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        Ok(SessionToken(token_from_parts(parts, &config)))
    }
}

/// AuthUser
///
/// The authenticated user of the current request. Resolved once per request:
/// the gate middleware stores it in the request extensions and every later
/// extraction reuses that value.
///
/// Rejection: 401 envelope when there is no live session.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AuthGate: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let gate = AuthGate::from_ref(state);
        let config = AppConfig::from_ref(state);
        let token = token_from_parts(parts, &config);

        let user = AuthUser(gate.require_authenticated(token.as_deref()).await?);
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

/// RequireAdmin
///
/// `AuthUser` plus the admin role check. Rejection: 401 without a session,
/// 403 for non-admins.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub User);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
    AuthGate: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        AuthGate::require_role(&user, Role::Admin)?;
        Ok(RequireAdmin(user))
    }
}

// --- Startup ---

/// ensure_default_admin
///
/// Creates the configured admin account when no admin exists yet.
pub async fn ensure_default_admin(repo: &Repository, config: &AppConfig) -> Result<(), AppError> {
    let existing = repo
        .find_one::<User>(&Filter::new().eq("role", Role::Admin.as_str()))
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let password_hash = hash_password(&config.admin_password)
        .map_err(|e| AppError::Internal(format!("hash admin password: {e}")))?;
    let admin = User {
        id: Uuid::new_v4(),
        username: config.admin_username.clone(),
        email: config.admin_email.clone(),
        password_hash,
        role: Role::Admin,
        is_verified: true,
        verification_token: None,
        reset_password_token: None,
        reset_password_expire: None,
        created_at: Utc::now(),
    };
    repo.insert(&admin).await?;
    tracing::info!(username = %admin.username, "default admin user created");
    Ok(())
}
