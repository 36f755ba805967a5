//! Authentication Module
//! Mission: Credential checks, dual-token sessions and role-based route gating

pub mod api;
pub mod cookies;
pub mod error;
pub mod gate;
pub mod jwt;
pub mod models;
pub mod password;
pub mod refresh_scheduler;
pub mod session_store;
pub mod user_store;

pub use api::AuthState;
pub use error::AuthApiError;
pub use gate::{route_gate, GateDecision, GateIdentity};
pub use jwt::{JwtHandler, TokenError};
pub use models::{Profile, Role};
pub use refresh_scheduler::RefreshScheduler;
pub use session_store::SessionStore;
pub use user_store::UserStore;
