use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::Redirect,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::{ApiJson, ApiQuery, Envelope, QueryPairs, parse_id};
use crate::{
    AppState,
    auth::{
        AuthGate, AuthState, AuthUser, RequireAdmin, SessionToken, expired_session_cookie,
        session_cookie,
    },
    credentials::{digest_token, hash_password, random_token, validate_password_strength, verify_password},
    error::AppError,
    mail,
    models::{
        AdminUpdateUserRequest, AuthStatus, ForgotPasswordRequest, LoginRequest, LoginResponse,
        RegisterRequest, ResetPasswordRequest, Role, SessionUser, USER_LIST, UpdateDetailsRequest,
        UpdatePasswordRequest, User, UserSummary, UserView, Violations, is_valid_email, required,
    },
    query::Filter,
    repository::Collection,
};

const USER_NOT_FOUND: &str = "User not found";
const RESET_WINDOW_MINUTES: i64 = 10;

fn hashed(password: &str) -> Result<String, AppError> {
    hash_password(password).map_err(|e| AppError::Internal(format!("hash password: {e}")))
}

fn check_strength(violations: &mut Violations, field: &str, password: &str) {
    if let Err(message) = validate_password_strength(password) {
        violations.add(field, message);
    }
}

/// Validates an optional username/email change and writes it onto `user`.
fn apply_identity(
    user: &mut User,
    username: Option<String>,
    email: Option<String>,
    violations: &mut Violations,
) {
    if let Some(username) = username {
        let username = username.trim().to_string();
        if username.is_empty() {
            violations.add("username", "Please add a username");
        } else {
            user.username = username;
        }
    }
    if let Some(email) = email {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            violations.add("email", "Please add a valid email");
        } else {
            user.email = email;
        }
    }
}

async fn load_user(state: &AppState, raw_id: &str) -> Result<User, AppError> {
    let id = parse_id(raw_id, USER_NOT_FOUND)?;
    state
        .repo
        .get::<User>(id)
        .await?
        .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.into()))
}

// --- Registration & Sessions ---

/// register
///
/// [Public Route] Creates an editor account and emails a verification link.
/// The email is best-effort; a send failure is logged and registration still
/// succeeds.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = UserView),
        (status = 400, description = "Invalid input, or username/email taken")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<Envelope<UserView>>), AppError> {
    let mut violations = Violations::new();
    let username = required(&mut violations, "username", payload.username, "Please add a username");
    let email = required(&mut violations, "email", payload.email, "Please add an email").to_lowercase();
    if !email.is_empty() && !is_valid_email(&email) {
        violations.add("email", "Please add a valid email");
    }
    let password = payload.password.unwrap_or_default();
    if password.is_empty() {
        violations.add("password", "Please add a password");
    } else {
        check_strength(&mut violations, "password", &password);
    }
    violations.into_result()?;

    let verification_token = random_token();
    let user = User {
        id: Uuid::new_v4(),
        username,
        email,
        password_hash: hashed(&password)?,
        role: Role::Editor,
        is_verified: false,
        verification_token: Some(verification_token.clone()),
        reset_password_token: None,
        reset_password_expire: None,
        created_at: Utc::now(),
    };
    state.repo.insert(&user).await?;
    tracing::info!(user_id = %user.id, username = %user.username, "user registered");

    let verify_url = format!(
        "{}/api/auth/verify-email/{verification_token}",
        state.config.base_url
    );
    if let Err(e) = state
        .mailer
        .send(mail::welcome(&user.email, &user.username, &verify_url))
        .await
    {
        tracing::warn!(user_id = %user.id, error = %e, "welcome email not sent");
    }

    Ok((
        StatusCode::CREATED,
        Envelope::data_with_message(
            UserView::from(&user),
            "Registration successful. Please check your email to verify your account.",
        ),
    ))
}

/// login
///
/// [Public Route] Checks the credentials, opens a server-side session and
/// sets its cookie.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Missing username or password"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    State(gate): State<AuthGate>,
    jar: CookieJar,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let username = payload.username.map(|u| u.trim().to_string()).unwrap_or_default();
    let password = payload.password.unwrap_or_default();
    if username.is_empty() || password.is_empty() {
        return Err(AppError::Validation(
            "Please provide a username and password".into(),
        ));
    }

    let (session, user) = gate.authenticate(&username, &password).await?;
    let jar = jar.add(session_cookie(&state.config, session.token));
    Ok((
        jar,
        Json(LoginResponse {
            success: true,
            user: UserSummary::from(&user),
        }),
    ))
}

/// logout
///
/// [Public Route] Destroys the session, if any, and clears the cookie.
/// Calling it without a session is not an error.
#[utoipa::path(
    get,
    path = "/api/auth/logout",
    responses((status = 200, description = "Logged out"))
)]
pub async fn logout(
    State(state): State<AppState>,
    State(gate): State<AuthGate>,
    SessionToken(token): SessionToken,
    jar: CookieJar,
) -> Result<(CookieJar, Json<Envelope<()>>), AppError> {
    gate.logout(token.as_deref()).await?;
    let jar = jar.remove(expired_session_cookie(&state.config));
    Ok((jar, Envelope::message("Logged out successfully")))
}

/// check_auth
///
/// [Public Route] Reports whether the caller has a live session.
#[utoipa::path(
    get,
    path = "/api/auth/check-auth",
    responses((status = 200, description = "Session status", body = AuthStatus))
)]
pub async fn check_auth(
    State(gate): State<AuthGate>,
    SessionToken(token): SessionToken,
) -> Result<Json<AuthStatus>, AppError> {
    let status = match gate.check_session(token.as_deref()).await? {
        AuthState::Anonymous => AuthStatus {
            success: true,
            is_authenticated: false,
            user: None,
        },
        AuthState::Authenticated(snapshot) => AuthStatus {
            success: true,
            is_authenticated: true,
            user: Some(SessionUser {
                username: snapshot.username,
                role: snapshot.role,
            }),
        },
    };
    Ok(Json(status))
}

/// get_me
///
/// [Authenticated Route] The caller's own account.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserView),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_me(AuthUser(user): AuthUser) -> Json<Envelope<UserView>> {
    Envelope::data(UserView::from(&user))
}

/// verify_email
///
/// [Public Route] Consumes a verification token and sends the browser to the
/// login page.
#[utoipa::path(
    get,
    path = "/api/auth/verify-email/{token}",
    params(("token" = String, Path, description = "Token from the welcome email")),
    responses(
        (status = 303, description = "Redirect to the login page"),
        (status = 400, description = "Unknown token")
    )
)]
pub async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Redirect, AppError> {
    let mut user = state
        .repo
        .find_one::<User>(&Filter::new().eq("verificationToken", token))
        .await?
        .ok_or_else(|| AppError::Validation("Invalid verification token".into()))?;

    user.is_verified = true;
    user.verification_token = None;
    state.repo.save(&user).await?;
    tracing::info!(user_id = %user.id, "email verified");
    Ok(Redirect::to("/login.html?verified=true"))
}

// --- Password Recovery ---

/// forgot_password
///
/// [Public Route] Emails a reset link valid for ten minutes. Only a digest of
/// the token is stored. When the email cannot be sent the token is withdrawn
/// and the request fails.
#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Email sent"),
        (status = 404, description = "No user with that email"),
        (status = 500, description = "Email could not be sent")
    )
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ForgotPasswordRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    let email = payload.email.map(|e| e.trim().to_lowercase()).unwrap_or_default();
    if email.is_empty() {
        return Err(AppError::Validation("Please provide an email".into()));
    }
    let mut user = state
        .repo
        .find_one::<User>(&Filter::new().eq("email", email))
        .await?
        .ok_or_else(|| AppError::NotFound("There is no user with that email".into()))?;

    let token = random_token();
    user.reset_password_token = Some(digest_token(&token));
    user.reset_password_expire = Some(Utc::now() + Duration::minutes(RESET_WINDOW_MINUTES));
    state.repo.save(&user).await?;

    let reset_url = format!("{}/reset-password.html?token={token}", state.config.base_url);
    if let Err(e) = state
        .mailer
        .send(mail::password_reset(&user.email, &reset_url))
        .await
    {
        user.reset_password_token = None;
        user.reset_password_expire = None;
        state.repo.save(&user).await?;
        return Err(AppError::Internal(format!("reset email for {}: {e}", user.id)));
    }

    Ok(Envelope::message("Email sent"))
}

/// reset_password
///
/// [Public Route] Sets a new password using an unexpired reset token.
#[utoipa::path(
    put,
    path = "/api/auth/reset-password/{token}",
    params(("token" = String, Path, description = "Token from the reset email")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset"),
        (status = 400, description = "Invalid or expired token, or weak password")
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ApiJson(payload): ApiJson<ResetPasswordRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    let now = Utc::now();
    let mut user = state
        .repo
        .find_one::<User>(&Filter::new().eq("resetPasswordToken", digest_token(&token)))
        .await?
        .filter(|u| u.reset_password_expire.is_some_and(|exp| exp > now))
        .ok_or_else(|| AppError::Validation("Invalid or expired token".into()))?;

    let password = payload.password.unwrap_or_default();
    validate_password_strength(&password).map_err(AppError::Validation)?;

    user.password_hash = hashed(&password)?;
    user.reset_password_token = None;
    user.reset_password_expire = None;
    state.repo.save(&user).await?;
    tracing::info!(user_id = %user.id, "password reset");
    Ok(Envelope::message("Password reset successful"))
}

// --- Own Account ---

/// update_details
///
/// [Authenticated Route] Changes the caller's username and/or email.
#[utoipa::path(
    put,
    path = "/api/auth/update-details",
    request_body = UpdateDetailsRequest,
    responses(
        (status = 200, description = "Updated", body = UserView),
        (status = 400, description = "Invalid input, or username/email taken"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn update_details(
    AuthUser(mut user): AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UpdateDetailsRequest>,
) -> Result<Json<Envelope<UserView>>, AppError> {
    let mut violations = Violations::new();
    apply_identity(&mut user, payload.username, payload.email, &mut violations);
    violations.into_result()?;

    if !state.repo.save(&user).await? {
        return Err(AppError::NotFound(USER_NOT_FOUND.into()));
    }
    Ok(Envelope::data(UserView::from(&user)))
}

/// update_password
///
/// [Authenticated Route] Changes the caller's password after checking the
/// current one.
#[utoipa::path(
    put,
    path = "/api/auth/update-password",
    request_body = UpdatePasswordRequest,
    responses(
        (status = 200, description = "Password updated"),
        (status = 400, description = "Missing or weak password"),
        (status = 401, description = "Current password is incorrect")
    )
)]
pub async fn update_password(
    AuthUser(mut user): AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UpdatePasswordRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    let current = payload.current_password.unwrap_or_default();
    let new_password = payload.new_password.unwrap_or_default();
    if current.is_empty() || new_password.is_empty() {
        return Err(AppError::Validation(
            "Please provide current and new password".into(),
        ));
    }

    let matches = verify_password(&current, &user.password_hash)
        .map_err(|e| AppError::Internal(format!("unreadable password hash for {}: {e}", user.id)))?;
    if !matches {
        return Err(AppError::Unauthorized("Current password is incorrect".into()));
    }
    validate_password_strength(&new_password).map_err(AppError::Validation)?;

    user.password_hash = hashed(&new_password)?;
    state.repo.save(&user).await?;
    Ok(Envelope::message("Password updated successfully"))
}

// --- User Management ---

/// get_users
///
/// [Admin Route] Lists accounts through the shared query grammar. Secret
/// fields are stripped from every document.
#[utoipa::path(
    get,
    path = "/api/auth/users",
    responses(
        (status = 200, description = "Page of users", body = [UserView]),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn get_users(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    ApiQuery(pairs): ApiQuery<QueryPairs>,
) -> Result<Json<Envelope<Vec<Value>>>, AppError> {
    let query = USER_LIST.translate(&pairs)?;
    let page = state.repo.list(Collection::Users, &query).await?;
    let data = page.data.into_iter().map(User::redact).collect();
    Ok(Envelope::page(data, query.pagination(page.total)))
}

#[utoipa::path(
    get,
    path = "/api/auth/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = UserView),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_user(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<UserView>>, AppError> {
    let user = load_user(&state, &id).await?;
    Ok(Envelope::data(UserView::from(&user)))
}

/// update_user
///
/// [Admin Route] Edits any account, including role, verification flag and
/// password.
#[utoipa::path(
    put,
    path = "/api/auth/users/{id}",
    params(("id" = String, Path, description = "User id")),
    request_body = AdminUpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = UserView),
        (status = 400, description = "Invalid input, or username/email taken"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_user(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<AdminUpdateUserRequest>,
) -> Result<Json<Envelope<UserView>>, AppError> {
    let mut user = load_user(&state, &id).await?;

    let mut violations = Violations::new();
    apply_identity(&mut user, payload.username, payload.email, &mut violations);
    if let Some(password) = &payload.password {
        check_strength(&mut violations, "password", password);
    }
    violations.into_result()?;

    if let Some(role) = payload.role {
        user.role = role;
    }
    if let Some(is_verified) = payload.is_verified {
        user.is_verified = is_verified;
    }
    if let Some(password) = payload.password {
        user.password_hash = hashed(&password)?;
    }

    if !state.repo.save(&user).await? {
        return Err(AppError::NotFound(USER_NOT_FOUND.into()));
    }
    Ok(Envelope::data(UserView::from(&user)))
}

/// delete_user
///
/// [Admin Route] Removes an account. Admins cannot delete themselves.
#[utoipa::path(
    delete,
    path = "/api/auth/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 400, description = "Attempt to delete own account"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_user(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<()>>, AppError> {
    let id = parse_id(&id, USER_NOT_FOUND)?;
    if id == admin.id {
        return Err(AppError::Validation("You cannot delete your own account".into()));
    }
    state
        .repo
        .delete::<User>(id)
        .await?
        .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.into()))?;
    tracing::info!(user_id = %id, "user deleted");
    Ok(Envelope::message("User deleted successfully"))
}
