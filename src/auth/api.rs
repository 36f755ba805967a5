//! Authentication API Endpoints
//! Mission: Login, logout, refresh and "who am I" over cookie-borne tokens

use crate::auth::{
    cookies::{clear_auth_cookies, CookiePolicy, ACCESS_COOKIE, REFRESH_COOKIE},
    error::AuthApiError,
    jwt::JwtHandler,
    models::{
        LoginRequest, LoginResponse, MeResponse, RefreshRequest, RefreshResponse, SanitizedUser,
        User, UserContext,
    },
    password::{dummy_digest, verify_password},
    session_store::SessionStore,
    user_store::UserStore,
};
use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub user_store: Arc<UserStore>,
    pub session_store: Arc<SessionStore>,
    pub jwt_handler: Arc<JwtHandler>,
    pub cookies: CookiePolicy,
    dummy_digest: Arc<String>,
}

impl AuthState {
    pub fn new(
        user_store: Arc<UserStore>,
        session_store: Arc<SessionStore>,
        jwt_handler: Arc<JwtHandler>,
        cookies: CookiePolicy,
    ) -> Result<Self> {
        let dummy_digest = Arc::new(dummy_digest(user_store.bcrypt_cost())?);
        Ok(Self {
            user_store,
            session_store,
            jwt_handler,
            cookies,
            dummy_digest,
        })
    }

    /// Access token + user-context cookies for a freshly authenticated user
    fn with_access_cookies(
        &self,
        jar: CookieJar,
        user: &User,
        access_token: String,
    ) -> Result<CookieJar, AuthApiError> {
        let user_cookie = self
            .cookies
            .user_cookie(&UserContext::from_user(user))
            .map_err(|e| AuthApiError::internal("Failed to build user cookie", e))?;
        Ok(jar
            .add(self.cookies.access_cookie(access_token))
            .add(user_cookie))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Login endpoint - POST /api/auth/login
pub async fn login(
    State(state): State<AuthState>,
    jar: CookieJar,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<LoginResponse>), AuthApiError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let (Some(username), Some(password)) =
        (non_empty(payload.username), non_empty(payload.password))
    else {
        debug!("Login rejected: missing username or password");
        return Err(AuthApiError::MissingCredentials);
    };

    info!("🔐 Login attempt: {}", username);

    let user = state
        .user_store
        .get_user_by_username(&username)
        .map_err(|e| AuthApiError::internal("Failed to look up user", e))?;

    // Unknown usernames still pay for one bcrypt verification
    let digest = user
        .as_ref()
        .map(|u| u.password_hash.clone())
        .unwrap_or_else(|| state.dummy_digest.as_ref().clone());
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &digest))
        .await
        .map_err(|e| AuthApiError::internal("Password verification task failed", e))?;

    let user = match user {
        Some(user) if valid => user,
        _ => {
            warn!("❌ Failed login attempt: {}", username);
            return Err(AuthApiError::InvalidCredentials);
        }
    };

    let profile = state
        .user_store
        .get_profile(&user)
        .map_err(|e| AuthApiError::internal("Failed to load profile", e))?;
    if profile.is_none() {
        warn!("User {} ({}) has no {} profile", user.username, user.id, user.role);
    }

    let (access_token, expires_in) = state
        .jwt_handler
        .generate_access_token(&user)
        .map_err(|e| AuthApiError::internal("Failed to issue access token", e))?;

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok());
    let session = state
        .session_store
        .create(
            &user.id,
            user_agent,
            Utc::now().timestamp(),
            state.cookies.refresh_ttl_secs,
        )
        .map_err(|e| AuthApiError::internal("Failed to persist session", e))?;

    let jar = state
        .with_access_cookies(jar, &user, access_token)?
        .add(state.cookies.refresh_cookie(session.refresh_token));

    info!("✅ Login successful: {} ({})", user.username, user.role);

    Ok((
        jar,
        Json(LoginResponse {
            user: SanitizedUser::new(&user, profile),
            expires_in,
        }),
    ))
}

/// Logout endpoint - POST /api/auth/logout
///
/// Always succeeds and always clears the auth cookies; session invalidation
/// is best effort.
pub async fn logout(State(state): State<AuthState>, jar: CookieJar) -> (CookieJar, Json<Value>) {
    if let Some(refresh_token) = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string()) {
        match state.session_store.invalidate(&refresh_token) {
            Ok(true) => info!("👋 Session invalidated on logout"),
            Ok(false) => debug!("Logout with an unknown or already invalid session"),
            Err(e) => warn!("Session invalidation failed during logout: {:#}", e),
        }
    }

    (clear_auth_cookies(jar), Json(json!({ "success": true })))
}

/// Refresh endpoint - POST /api/auth/refresh
///
/// Mints a new access token from a live session. The session's own expiry
/// is never extended.
pub async fn refresh(
    State(state): State<AuthState>,
    jar: CookieJar,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<RefreshResponse>), AuthApiError> {
    let refresh_token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| payload.ok().and_then(|Json(body)| body.refresh_token))
        .filter(|t| !t.is_empty())
        .ok_or(AuthApiError::InvalidSession)?;

    let now = Utc::now().timestamp();
    let session = state
        .session_store
        .find_active(&refresh_token, now)
        .map_err(|e| AuthApiError::internal("Failed to look up session", e))?
        .ok_or_else(|| {
            debug!("Refresh rejected: session absent, invalidated or expired");
            AuthApiError::InvalidSession
        })?;

    let user = state
        .user_store
        .get_user_by_id(&session.user_id)
        .map_err(|e| AuthApiError::internal("Failed to look up session owner", e))?
        .ok_or_else(|| {
            warn!("Session {} belongs to a vanished user {}", session.id, session.user_id);
            AuthApiError::InvalidSession
        })?;

    let (access_token, expires_in) = state
        .jwt_handler
        .generate_access_token(&user)
        .map_err(|e| AuthApiError::internal("Failed to issue access token", e))?;

    if let Err(e) = state.session_store.touch(&session.id, now) {
        warn!("Failed to record session use for {}: {:#}", session.id, e);
    }

    let jar = state.with_access_cookies(jar, &user, access_token.clone())?;

    debug!("🔄 Access token refreshed for {}", user.username);

    Ok((
        jar,
        Json(RefreshResponse {
            token: access_token,
            expires_in,
        }),
    ))
}

/// Current user - GET /api/auth/me
///
/// The identity and profile are read fresh from the store on every call.
pub async fn me(
    State(state): State<AuthState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Json<MeResponse>, AuthApiError> {
    let token = jar
        .get(ACCESS_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| bearer_token(&headers).map(str::to_string))
        .ok_or(AuthApiError::Unauthenticated)?;

    let claims = state
        .jwt_handler
        .validate_token(&token)
        .map_err(|_| AuthApiError::Unauthenticated)?;
    let user_id = claims.user_id().ok_or(AuthApiError::Unauthenticated)?;

    let user = state
        .user_store
        .get_user_by_id(&user_id)
        .map_err(|e| AuthApiError::internal("Failed to look up user", e))?
        .ok_or(AuthApiError::UserNotFound)?;

    if user.role != claims.role {
        warn!(
            "Role drift for {}: token says {}, store says {}",
            user.username, claims.role, user.role
        );
        return Err(AuthApiError::Unauthenticated);
    }

    let profile = state
        .user_store
        .get_profile(&user)
        .map_err(|e| AuthApiError::internal("Failed to load profile", e))?;

    Ok(Json(MeResponse {
        user: SanitizedUser::new(&user, profile),
    }))
}
