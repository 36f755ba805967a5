//! Campus Gate - authentication gateway for the school dashboard
//! Mission: Sign users in, keep their sessions alive, keep each role in its own section

use anyhow::{Context, Result};
use campus_gate::{
    auth::{AuthState, JwtHandler, SessionStore, UserStore},
    config::Config,
    middleware::LoginThrottle,
    server::build_router,
};
use clap::Parser;
use dotenv::dotenv;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::{net::TcpListener, time::interval};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const THROTTLE_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let config = Config::parse();
    config.validate().context("Invalid configuration")?;

    info!("🚀 Campus Gate starting ({})", config.app_env);
    if !config.is_production() {
        warn!("Not running in production mode: access cookies are sent without Secure");
    }

    let user_store =
        Arc::new(UserStore::new(&config.db_path)?.with_bcrypt_cost(config.bcrypt_cost));
    let session_store = Arc::new(SessionStore::new(&config.db_path)?);
    info!("🗄️  Auth database: {}", config.db_path);

    if let (Some(username), Some(password)) = (
        config.bootstrap_admin_username.as_deref(),
        config.bootstrap_admin_password.as_deref(),
    ) {
        let store = user_store.clone();
        let (username, password) = (username.to_string(), password.to_string());
        tokio::task::spawn_blocking(move || store.ensure_bootstrap_admin(&username, &password))
            .await
            .context("Bootstrap task failed")??;
    }

    let jwt_handler = Arc::new(JwtHandler::with_ttl(
        &config.jwt_access_secret,
        config.access_ttl_secs,
    ));
    let auth_state = AuthState::new(
        user_store,
        session_store,
        jwt_handler,
        config.cookie_policy(),
    )?;

    let throttle = LoginThrottle::new(config.throttle_config());
    {
        let throttle = throttle.clone();
        tokio::spawn(async move {
            let mut ticker = interval(THROTTLE_CLEANUP_INTERVAL);
            loop {
                ticker.tick().await;
                throttle.cleanup();
            }
        });
    }

    let app = build_router(auth_state, throttle);

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("🎯 Listening on {}", config.bind);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("👋 Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus_gate=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // 1) Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // 2) Crate-root .env when launched from elsewhere
    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}
