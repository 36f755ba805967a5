//! Campus Gate Library
//!
//! Role-based authentication for the school dashboard. Exposes the auth
//! core, the HTTP surface and a session client for use by binaries and tests.

pub mod auth;
pub mod client;
pub mod config;
pub mod middleware;
pub mod server;
