//! Request Gate
//! Mission: Decide, per navigation, whether to continue or redirect based on
//! the auth cookies alone. Fails closed.

use crate::auth::{
    cookies::{clear_auth_cookies, decode_user_context, ACCESS_COOKIE, USER_COOKIE},
    jwt::JwtHandler,
    models::{Claims, Role},
};
use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

pub const SIGN_IN_PATH: &str = "/sign-in";
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Outcome of the gate for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Pass through untouched (assets, internal API, anonymous sign-in page)
    Continue,
    /// Send the browser elsewhere, optionally wiping every auth cookie
    Redirect {
        location: &'static str,
        clear_cookies: bool,
    },
    /// Pass through with the verified identity attached
    ContinueAs { user_id: String, role: Role },
}

impl GateDecision {
    fn to(location: &'static str) -> Self {
        GateDecision::Redirect {
            location,
            clear_cookies: false,
        }
    }

    fn sign_in_clearing_cookies() -> Self {
        GateDecision::Redirect {
            location: SIGN_IN_PATH,
            clear_cookies: true,
        }
    }
}

/// Verified identity made available to handlers behind the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateIdentity {
    pub user_id: String,
    pub role: Role,
}

/// What the gate reads off a request
#[derive(Debug, Clone, Copy, Default)]
pub struct GateInput<'a> {
    pub path: &'a str,
    pub access_token: Option<&'a str>,
    pub user_cookie: Option<&'a str>,
}

enum Credentials {
    Absent,
    Valid(Claims),
    Invalid,
}

/// Static assets and internal API routes never go through the gate.
///
/// Nothing under a role section is bypassed, whatever its file name looks like.
pub fn is_bypassed(path: &str) -> bool {
    if path.starts_with("/_next") || path.starts_with("/api/") {
        return true;
    }
    if Role::from_segment(leading_segment(path)).is_some() {
        return false;
    }
    path.contains("/favicon")
        || path
            .rsplit('/')
            .next()
            .is_some_and(|last| last.contains('.'))
}

fn normalize(path: &str) -> &str {
    match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => path,
    }
}

fn leading_segment(path: &str) -> &str {
    path.trim_start_matches('/').split('/').next().unwrap_or("")
}

/// Verify the access token, then cross-check the non-authoritative user cookie.
fn authenticate(jwt: &JwtHandler, input: &GateInput<'_>, now: i64) -> Credentials {
    let Some(token) = input.access_token else {
        return Credentials::Absent;
    };

    let claims = match jwt.validate_token_at(token, now) {
        Ok(claims) => claims,
        Err(e) => {
            debug!("Gate: access token rejected ({})", e);
            return Credentials::Invalid;
        }
    };

    if let Some(raw) = input.user_cookie {
        match decode_user_context(raw) {
            Some(context) if context.id == claims.sub && context.role == claims.role => {}
            Some(context) => {
                debug!(
                    "Gate: user cookie disagrees with token ({} {} vs {} {})",
                    context.id, context.role, claims.sub, claims.role
                );
                return Credentials::Invalid;
            }
            None => {
                debug!("Gate: user cookie is unparsable");
                return Credentials::Invalid;
            }
        }
    }

    Credentials::Valid(claims)
}

/// Pure gate decision for one request as of `now` (unix seconds)
pub fn decide(jwt: &JwtHandler, input: &GateInput<'_>, now: i64) -> GateDecision {
    if is_bypassed(input.path) {
        return GateDecision::Continue;
    }

    let credentials = authenticate(jwt, input, now);
    let path = normalize(input.path);

    if path == "/" {
        return match credentials {
            Credentials::Valid(claims) if input.user_cookie.is_some() => {
                GateDecision::to(claims.role.dashboard_path())
            }
            Credentials::Invalid => GateDecision::sign_in_clearing_cookies(),
            Credentials::Absent if input.user_cookie.is_some() => {
                GateDecision::sign_in_clearing_cookies()
            }
            _ => GateDecision::to(SIGN_IN_PATH),
        };
    }

    let is_public = path == SIGN_IN_PATH;

    match credentials {
        Credentials::Invalid => GateDecision::sign_in_clearing_cookies(),
        // A user cookie without a token is left over from an ended session
        Credentials::Absent if input.user_cookie.is_some() => {
            GateDecision::sign_in_clearing_cookies()
        }
        Credentials::Absent if is_public => GateDecision::Continue,
        Credentials::Absent => GateDecision::to(SIGN_IN_PATH),
        Credentials::Valid(claims) if is_public => GateDecision::to(claims.role.dashboard_path()),
        Credentials::Valid(claims) => match Role::from_segment(leading_segment(path)) {
            Some(section) if section != claims.role => {
                GateDecision::to(claims.role.dashboard_path())
            }
            _ => GateDecision::ContinueAs {
                user_id: claims.sub,
                role: claims.role,
            },
        },
    }
}

/// Gate middleware: run [`decide`] and apply the result.
///
/// Client-supplied identity headers are always stripped first, so only the
/// gate can set them.
pub async fn route_gate(
    State(jwt_handler): State<Arc<JwtHandler>>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    req.headers_mut().remove(USER_ID_HEADER);
    req.headers_mut().remove(USER_ROLE_HEADER);

    let input = GateInput {
        path: req.uri().path(),
        access_token: jar.get(ACCESS_COOKIE).map(|c| c.value()),
        user_cookie: jar.get(USER_COOKIE).map(|c| c.value()),
    };
    let decision = decide(&jwt_handler, &input, Utc::now().timestamp());

    match decision {
        GateDecision::Continue => next.run(req).await,
        GateDecision::Redirect {
            location,
            clear_cookies: true,
        } => (clear_auth_cookies(CookieJar::new()), Redirect::temporary(location)).into_response(),
        GateDecision::Redirect { location, .. } => Redirect::temporary(location).into_response(),
        GateDecision::ContinueAs { user_id, role } => {
            let Ok(user_id_value) = HeaderValue::from_str(&user_id) else {
                return (
                    clear_auth_cookies(CookieJar::new()),
                    Redirect::temporary(SIGN_IN_PATH),
                )
                    .into_response();
            };
            let headers = req.headers_mut();
            headers.insert(HeaderName::from_static(USER_ID_HEADER), user_id_value);
            headers.insert(
                HeaderName::from_static(USER_ROLE_HEADER),
                HeaderValue::from_static(role.as_str()),
            );
            req.extensions_mut().insert(GateIdentity { user_id, role });
            next.run(req).await
        }
    }
}
