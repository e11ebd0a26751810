use std::sync::OnceLock;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use tracing::{debug, info};

use super::error::{ApiError, ApiResult};
use super::types::*;
use crate::db::{AccessToken, AccessTokenRepo, User, UserRepo, WatchlistRepo};
use crate::server::AppState;
use crate::session::UserProfile;

const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_PATTERN: OnceLock<Regex> = OnceLock::new();
static USERNAME_PATTERN: OnceLock<Regex> = OnceLock::new();

fn email_pattern() -> &'static Regex {
    EMAIL_PATTERN.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap())
}

fn username_pattern() -> &'static Regex {
    USERNAME_PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.-]{3,32}$").unwrap())
}

/// The signed-in user, put in the request extensions by `auth_middleware`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub username: String,
    pub is_admin: bool,
}

impl AuthUser {
    pub fn require_admin(&self) -> ApiResult<()> {
        if self.is_admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin access required"))
        }
    }
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }
}

/// Resolves a bearer token to its user. Requests without a valid token
/// pass through anonymously; handlers that need a user reject them.
pub async fn auth_middleware(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    if let Some(token) = bearer_token(req.headers()) {
        match lookup_user(&state, token).await {
            Some(user) => {
                req.extensions_mut().insert(AuthUser {
                    id: user.id,
                    username: user.username,
                    is_admin: user.is_admin,
                });
            }
            None => debug!("Ignoring unknown or expired access token"),
        }
    }

    next.run(req).await
}

async fn lookup_user(state: &AppState, token: &str) -> Option<User> {
    let token = state.db.get_token(token).await.ok()?;
    if token.is_expired(Utc::now()) {
        return None;
    }
    state.db.get_user_by_id(&token.userid).await.ok()
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let username = req.username.trim();
    let email = req.email.trim().to_lowercase();

    if !username_pattern().is_match(username) {
        return Err(ApiError::BadRequest(
            "Username must be 3 to 32 letters, digits, '.', '_' or '-'".to_string(),
        ));
    }
    if !email_pattern().is_match(&email) {
        return Err(ApiError::BadRequest("Invalid email address".to_string()));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let cost = state.config.auth.password_cost;
    let password = req.password;
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        username: username.to_string(),
        email,
        password: hash,
        is_admin: state.config.auth.admins.iter().any(|a| a == username),
        created: Some(Utc::now().to_rfc3339()),
    };
    state.db.create_user(&user).await?;
    info!(username = %user.username, admin = user.is_admin, "User registered");

    let token = issue_token(&state, &user).await?;
    let user = profile(&state, &user).await?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let user = match state.db.get_user_by_email(req.email.trim()).await {
        Ok(user) => user,
        Err(crate::db::DbError::NotFound(_)) => return Err(ApiError::InvalidCredentials),
        Err(e) => return Err(e.into()),
    };

    let hash = user.password.clone();
    let password = req.password;
    let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .unwrap_or(false);
    if !valid {
        return Err(ApiError::InvalidCredentials);
    }

    let token = issue_token(&state, &user).await?;
    let user = profile(&state, &user).await?;
    Ok(Json(AuthResponse { token, user }))
}

pub async fn logout(State(state): State<AppState>, _user: AuthUser, headers: HeaderMap) -> ApiResult<StatusCode> {
    if let Some(token) = bearer_token(&headers) {
        state.db.delete_token(token).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<UserProfile>> {
    let user = state.db.get_user_by_id(&auth.id).await?;
    Ok(Json(profile(&state, &user).await?))
}

async fn issue_token(state: &AppState, user: &User) -> ApiResult<String> {
    let now = Utc::now();
    let token = AccessToken {
        token: uuid::Uuid::new_v4().to_string(),
        userid: user.id.clone(),
        created: Some(now),
        expires: Some(now + Duration::hours(state.config.auth.token_ttl_hours)),
    };
    state.db.upsert_token(&token).await?;
    Ok(token.token)
}

pub(super) async fn profile(state: &AppState, user: &User) -> ApiResult<UserProfile> {
    let join_date = user
        .created
        .as_deref()
        .and_then(|c| DateTime::parse_from_rfc3339(c).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    Ok(UserProfile {
        id: user.id.clone(),
        username: user.username.clone(),
        email: user.email.clone(),
        join_date,
        is_admin: user.is_admin,
        watchlist: state.db.get_watchlist(&user.id).await?,
    })
}
