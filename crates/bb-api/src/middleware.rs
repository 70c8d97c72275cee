//! bulletin-board/crates/bb-api/src/middleware.rs Middleware
//!
//! Request logging and response hardening.

use actix_web::middleware::{DefaultHeaders, Logger};

// Access log in the default format:
// remote-ip "request-line" status-code response-size "referrer" "user-agent"
pub fn standard_middleware() -> Logger {
    Logger::default()
}

// Pages only load our own stylesheet and post forms back to us.
pub fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add((
            "Content-Security-Policy",
            "default-src 'self'; form-action 'self'; frame-ancestors 'none'",
        ))
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("Referrer-Policy", "strict-origin-when-cross-origin"))
}
