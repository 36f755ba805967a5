//! SessionClient against a live server on a loopback port

use campus_gate::auth::cookies::CookiePolicy;
use campus_gate::auth::models::{ParentProfile, Profile};
use campus_gate::auth::{AuthState, JwtHandler, Role, SessionStore, UserStore};
use campus_gate::client::SessionClient;
use campus_gate::middleware::{LoginThrottle, ThrottleConfig};
use campus_gate::server::build_router;
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::net::TcpListener;

const SECRET: &str = "client-test-secret-client-test-secret";
const PASSWORD: &str = "parent-password";

async fn spawn_server() -> (String, Arc<UserStore>, Arc<SessionStore>, NamedTempFile) {
    let db = NamedTempFile::new().unwrap();
    let path = db.path().to_str().unwrap();

    let users = Arc::new(UserStore::new(path).unwrap().with_bcrypt_cost(4));
    let sessions = Arc::new(SessionStore::new(path).unwrap());
    users
        .create_user(
            "mr.parent",
            PASSWORD,
            Profile::Parent(ParentProfile {
                name: "Pat".to_string(),
                surname: "Parent".to_string(),
                phone: None,
            }),
        )
        .unwrap();

    let state = AuthState::new(
        users.clone(),
        sessions.clone(),
        Arc::new(JwtHandler::new(SECRET)),
        CookiePolicy {
            secure: false,
            access_ttl_secs: 900,
            refresh_ttl_secs: 3_600,
        },
    )
    .unwrap();
    let app = build_router(state, LoginThrottle::new(ThrottleConfig::default()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    (format!("http://{addr}"), users, sessions, db)
}

#[tokio::test]
async fn test_client_session_lifecycle() {
    let (base_url, users, sessions, _db) = spawn_server().await;
    let client = SessionClient::new(&base_url).unwrap();

    assert!(client.me().await.unwrap().is_none());
    assert!(!client.refresh_pending());

    let user = client.login("mr.parent", PASSWORD).await.unwrap();
    assert_eq!(user.role, Role::Parent);
    assert!(client.refresh_pending());

    let me = client.me().await.unwrap().unwrap();
    assert_eq!(me.username, "mr.parent");

    let lifetime = client.refresh().await.unwrap();
    assert_eq!(lifetime.as_secs(), 900);

    client.logout().await.unwrap();
    assert!(!client.refresh_pending());
    assert!(client.me().await.unwrap().is_none());
    assert!(client.refresh().await.is_none());

    let stored = users.get_user_by_username("mr.parent").unwrap().unwrap();
    let history = sessions.list_for_user(&stored.id).unwrap();
    assert_eq!(history.len(), 1);
    assert!(!history[0].is_valid);
}

#[tokio::test]
async fn test_client_login_with_bad_password_fails() {
    let (base_url, _users, _sessions, _db) = spawn_server().await;
    let client = SessionClient::new(&base_url).unwrap();

    assert!(client.login("mr.parent", "wrong").await.is_err());
    assert!(!client.refresh_pending());
}
