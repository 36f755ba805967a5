//! Session client
//!
//! Non-browser client for the auth endpoints. Holds the tokens it receives
//! and owns the refresh scheduler: login schedules the next refresh, logout
//! cancels it.

use crate::auth::cookies::{ACCESS_COOKIE, REFRESH_COOKIE};
use crate::auth::models::{LoginResponse, MeResponse, RefreshRequest, RefreshResponse, SanitizedUser};
use crate::auth::RefreshScheduler;
use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use reqwest::{header, StatusCode};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct Tokens {
    access: Option<String>,
    refresh: Option<String>,
}

pub struct SessionClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<Mutex<Tokens>>,
    scheduler: RefreshScheduler,
}

impl SessionClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::with_scheduler(http, base_url, RefreshScheduler::new()))
    }

    pub fn with_scheduler(http: reqwest::Client, base_url: &str, scheduler: RefreshScheduler) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens: Arc::new(Mutex::new(Tokens::default())),
            scheduler,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sign in and start the refresh cycle
    pub async fn login(&self, username: &str, password: &str) -> Result<SanitizedUser> {
        let response = self
            .http
            .post(self.url("/api/auth/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .context("Login request failed")?;

        if !response.status().is_success() {
            bail!("Login rejected with status {}", response.status());
        }

        {
            let mut tokens = self.tokens.lock();
            for cookie in response.cookies() {
                match cookie.name() {
                    ACCESS_COOKIE => tokens.access = Some(cookie.value().to_string()),
                    REFRESH_COOKIE => tokens.refresh = Some(cookie.value().to_string()),
                    _ => {}
                }
            }
        }

        let body: LoginResponse = response.json().await.context("Invalid login response")?;

        let http = self.http.clone();
        let url = self.url("/api/auth/refresh");
        let tokens = self.tokens.clone();
        self.scheduler.schedule(
            Duration::from_secs(body.expires_in.max(0) as u64),
            move || refresh_once(http.clone(), url.clone(), tokens.clone()),
        );

        Ok(body.user)
    }

    /// Refresh the access token now. Returns the new lifetime on success.
    pub async fn refresh(&self) -> Option<Duration> {
        refresh_once(
            self.http.clone(),
            self.url("/api/auth/refresh"),
            self.tokens.clone(),
        )
        .await
    }

    /// Fetch the current user; `None` when the server does not recognize us
    pub async fn me(&self) -> Result<Option<SanitizedUser>> {
        let access = self.tokens.lock().access.clone();
        let Some(access) = access else {
            return Ok(None);
        };

        let response = self
            .http
            .get(self.url("/api/auth/me"))
            .bearer_auth(access)
            .send()
            .await
            .context("Profile request failed")?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body: MeResponse = response.json().await.context("Invalid profile response")?;
                Ok(Some(body.user))
            }
            status => bail!("Profile request failed with status {}", status),
        }
    }

    /// Cancel the refresh cycle, drop local tokens and tell the server
    pub async fn logout(&self) -> Result<()> {
        self.scheduler.cancel();
        let refresh = {
            let mut tokens = self.tokens.lock();
            tokens.access = None;
            tokens.refresh.take()
        };

        let mut request = self.http.post(self.url("/api/auth/logout"));
        if let Some(refresh) = refresh {
            request = request.header(header::COOKIE, format!("{REFRESH_COOKIE}={refresh}"));
        }
        let response = request.send().await.context("Logout request failed")?;
        if !response.status().is_success() {
            bail!("Logout failed with status {}", response.status());
        }
        Ok(())
    }

    pub fn refresh_pending(&self) -> bool {
        self.scheduler.is_pending()
    }
}

async fn refresh_once(
    http: reqwest::Client,
    url: String,
    tokens: Arc<Mutex<Tokens>>,
) -> Option<Duration> {
    let refresh_token = tokens.lock().refresh.clone()?;

    let response = match http
        .post(&url)
        .json(&RefreshRequest {
            refresh_token: Some(refresh_token),
        })
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            warn!("Token refresh error: {}", e);
            return None;
        }
    };

    if !response.status().is_success() {
        warn!("Token refresh rejected with status {}", response.status());
        return None;
    }

    match response.json::<RefreshResponse>().await {
        Ok(body) => {
            tokens.lock().access = Some(body.token);
            debug!("Access token refreshed, valid for {}s", body.expires_in);
            Some(Duration::from_secs(body.expires_in.max(0) as u64))
        }
        Err(e) => {
            warn!("Invalid refresh response: {}", e);
            None
        }
    }
}
