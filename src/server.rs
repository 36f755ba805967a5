//! HTTP surface
//!
//! Auth endpoints under `/api/auth`, every other page behind the request
//! gate. The dashboard pages themselves live elsewhere; the handlers here
//! only report which section and identity the gate let through.

use crate::auth::{api as auth_api, route_gate, AuthState, GateIdentity};
use crate::middleware::{login_throttle, request_logging, LoginThrottle};
use axum::{
    http::Uri,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

/// Assemble the full application router
pub fn build_router(auth_state: AuthState, throttle: LoginThrottle) -> Router {
    let jwt_handler = auth_state.jwt_handler.clone();

    let login_route = Router::new()
        .route("/api/auth/login", post(auth_api::login))
        .route_layer(middleware::from_fn_with_state(throttle, login_throttle));

    let auth_router = Router::new()
        .route("/api/auth/logout", post(auth_api::logout))
        .route("/api/auth/refresh", post(auth_api::refresh))
        .route("/api/auth/me", get(auth_api::me))
        .merge(login_route)
        .with_state(auth_state);

    let gated_pages = Router::new()
        .route("/sign-in", get(sign_in_page))
        .fallback(dashboard_page)
        .layer(middleware::from_fn_with_state(jwt_handler, route_gate));

    let public_routes = Router::new().route("/health", get(health_check));

    gated_pages
        .merge(auth_router)
        .merge(public_routes)
        .layer(middleware::from_fn(request_logging))
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> &'static str {
    "ok"
}

async fn sign_in_page() -> Json<Value> {
    Json(json!({ "page": "sign-in" }))
}

async fn dashboard_page(identity: Option<Extension<GateIdentity>>, uri: Uri) -> Json<Value> {
    let identity = identity.map(|Extension(identity)| identity);
    Json(json!({
        "path": uri.path(),
        "userId": identity.as_ref().map(|i| i.user_id.clone()),
        "role": identity.map(|i| i.role),
    }))
}
