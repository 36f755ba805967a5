//! Auth cookie transport
//! Mission: One place for cookie names, attributes and the user-context encoding

use crate::auth::models::UserContext;
use anyhow::{Context, Result};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use time::Duration;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";
pub const USER_COOKIE: &str = "user";

const ALL_AUTH_COOKIES: [&str; 3] = [ACCESS_COOKIE, REFRESH_COOKIE, USER_COOKIE];

/// Attributes applied to every auth cookie we set
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    pub secure: bool,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

impl CookiePolicy {
    /// HttpOnly access token, SameSite=Lax so top-level navigation into the
    /// dashboard still carries it.
    pub fn access_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((ACCESS_COOKIE, token))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(Duration::seconds(self.access_ttl_secs))
            .build()
    }

    /// HttpOnly refresh token, always Secure and SameSite=Strict
    pub fn refresh_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((REFRESH_COOKIE, token))
            .path("/")
            .http_only(true)
            .secure(true)
            .same_site(SameSite::Strict)
            .max_age(Duration::seconds(self.refresh_ttl_secs))
            .build()
    }

    /// Script-readable copy of the sanitized identity, same lifetime as the access token
    pub fn user_cookie(&self, context: &UserContext) -> Result<Cookie<'static>> {
        Ok(Cookie::build((USER_COOKIE, encode_user_context(context)?))
            .path("/")
            .http_only(false)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(Duration::seconds(self.access_ttl_secs))
            .build())
    }
}

/// Emit removal cookies for every auth cookie, whether or not the request carried them
pub fn clear_auth_cookies(mut jar: CookieJar) -> CookieJar {
    for name in ALL_AUTH_COOKIES {
        let mut removal = Cookie::build((name, "")).path("/").build();
        removal.make_removal();
        jar = jar.add(removal);
    }
    jar
}

pub fn encode_user_context(context: &UserContext) -> Result<String> {
    let json = serde_json::to_vec(context).context("Failed to serialize user context")?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decode the user cookie. Anything unparsable is `None`.
pub fn decode_user_context(raw: &str) -> Option<UserContext> {
    let bytes = URL_SAFE_NO_PAD.decode(raw.trim()).ok()?;
    serde_json::from_slice(&bytes).ok()
}
