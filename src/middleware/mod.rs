//! Cross-cutting HTTP middleware.
//!
//! - Request logging with latency tracking
//! - Login attempt throttling per IP address

pub mod logging;
pub mod rate_limit;

pub use logging::request_logging;
pub use rate_limit::{login_throttle, LoginThrottle, ThrottleConfig};
