//! Process configuration
//!
//! Read once at startup from flags or the environment (after `.env` has been
//! loaded). Secrets never come from request data.

use crate::auth::cookies::CookiePolicy;
use crate::auth::password::MIN_PRODUCTION_COST;
use crate::middleware::ThrottleConfig;
use anyhow::{bail, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

const MIN_SECRET_LEN: usize = 32;

#[derive(Parser, Debug, Clone)]
#[command(name = "campus-gate")]
#[command(about = "Role-based authentication gateway for the school dashboard")]
pub struct Config {
    /// Listen address
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// SQLite file holding identities, profiles and sessions
    #[arg(long, env = "AUTH_DB_PATH", default_value = "campus_gate_auth.db")]
    pub db_path: String,

    /// HS256 secret for access tokens
    #[arg(long, env = "JWT_ACCESS_SECRET", hide_env_values = true)]
    pub jwt_access_secret: String,

    /// Access token (and user-context cookie) lifetime in seconds
    #[arg(long, env = "ACCESS_TOKEN_TTL_SECS", default_value = "900")]
    pub access_ttl_secs: i64,

    /// Refresh token / session lifetime in seconds
    #[arg(long, env = "REFRESH_TOKEN_TTL_SECS", default_value = "604800")]
    pub refresh_ttl_secs: i64,

    /// bcrypt work factor for new password hashes
    #[arg(long, env = "BCRYPT_COST", default_value = "12")]
    pub bcrypt_cost: u32,

    /// Deployment environment; "production" forces Secure cookies
    #[arg(long, env = "APP_ENV", default_value = "development")]
    pub app_env: String,

    /// Login attempts allowed per client IP per window
    #[arg(long, env = "LOGIN_MAX_ATTEMPTS", default_value = "10")]
    pub login_max_attempts: u32,

    /// Login throttling window in seconds
    #[arg(long, env = "LOGIN_WINDOW_SECS", default_value = "60")]
    pub login_window_secs: u64,

    /// Username for the first-boot admin
    #[arg(long, env = "BOOTSTRAP_ADMIN_USERNAME")]
    pub bootstrap_admin_username: Option<String>,

    /// Password for the first-boot admin
    #[arg(long, env = "BOOTSTRAP_ADMIN_PASSWORD", hide_env_values = true)]
    pub bootstrap_admin_password: Option<String>,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.jwt_access_secret.len() < MIN_SECRET_LEN {
            bail!("JWT_ACCESS_SECRET must be at least {MIN_SECRET_LEN} bytes");
        }
        if self.access_ttl_secs <= 0 {
            bail!("ACCESS_TOKEN_TTL_SECS must be positive");
        }
        if self.refresh_ttl_secs <= self.access_ttl_secs {
            bail!("REFRESH_TOKEN_TTL_SECS must exceed ACCESS_TOKEN_TTL_SECS");
        }
        if !(MIN_PRODUCTION_COST..=31).contains(&self.bcrypt_cost) {
            bail!("BCRYPT_COST must be between {MIN_PRODUCTION_COST} and 31");
        }
        if self.login_max_attempts == 0 || self.login_window_secs == 0 {
            bail!("Login throttling limits must be positive");
        }
        if self.bootstrap_admin_username.is_some() != self.bootstrap_admin_password.is_some() {
            bail!("BOOTSTRAP_ADMIN_USERNAME and BOOTSTRAP_ADMIN_PASSWORD must be set together");
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    pub fn cookie_policy(&self) -> CookiePolicy {
        CookiePolicy {
            secure: self.is_production(),
            access_ttl_secs: self.access_ttl_secs,
            refresh_ttl_secs: self.refresh_ttl_secs,
        }
    }

    pub fn throttle_config(&self) -> ThrottleConfig {
        ThrottleConfig {
            max_attempts: self.login_max_attempts,
            window: Duration::from_secs(self.login_window_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn parse(extra: &[&str]) -> Config {
        let mut args = vec!["campus-gate", "--jwt-access-secret", SECRET];
        args.extend_from_slice(extra);
        Config::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = parse(&["--app-env", "development"]);
        config.validate().unwrap();
        assert_eq!(config.access_ttl_secs, 900);
        assert_eq!(config.refresh_ttl_secs, 7 * 24 * 3600);
        assert!(!config.cookie_policy().secure);
    }

    #[test]
    fn test_production_forces_secure_cookies() {
        let config = parse(&["--app-env", "Production"]);
        assert!(config.is_production());
        assert!(config.cookie_policy().secure);
    }

    #[test]
    fn test_short_secret_rejected() {
        let config = Config::try_parse_from(["campus-gate", "--jwt-access-secret", "short"]).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_weak_bcrypt_cost_rejected() {
        let config = parse(&["--bcrypt-cost", "8"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bootstrap_credentials_must_come_together() {
        let config = parse(&["--bootstrap-admin-username", "root"]);
        assert!(config.validate().is_err());

        let config = parse(&[
            "--bootstrap-admin-username",
            "root",
            "--bootstrap-admin-password",
            "pw",
        ]);
        config.validate().unwrap();
    }
}
