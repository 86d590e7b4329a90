//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers (CSP, frame and referrer policy)
//! 5. Session layer (tower-sessions with `PostgreSQL` store)
//! 6. Visitor log (page hits and the `vuid` cookie)
//! 7. Rate limiting on auth and API routes (governor)

pub mod auth;
pub mod flash;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;
pub mod visitor_log;

pub use auth::{
    BearerUser, OptionalBearerUser, OptionalUser, RequireAdmin, RequireCustomer, RequireStaff,
    RequireTech, RequireUser, clear_current_user, set_current_user,
};
pub use flash::{Page, flash_redirect, push_flash, take_flashes};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
pub use visitor_log::visitor_log_middleware;
