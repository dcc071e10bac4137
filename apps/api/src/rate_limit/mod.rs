//! Per-endpoint request throttling.
//!
//! `RateLimiter` holds the counters; `enforce` is the axum middleware that
//! runs one check per request before the handler (and its body extractors)
//! get to run.

pub mod client;
pub mod limiter;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

pub use client::client_identity;
pub use limiter::{spawn_sweeper, RateLimitConfig, RateLimiter};

use crate::errors::AppError;

/// Axum middleware: rejects with 429 when the endpoint's limiter says so.
///
/// Install with `axum::middleware::from_fn_with_state(limiter, enforce)`.
pub async fn enforce(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_identity(request.headers());
    if limiter.check(&client).is_admitted() {
        next.run(request).await
    } else {
        AppError::RateLimited.into_response()
    }
}

/// The independent limiters, one per rate-limited endpoint.
#[derive(Clone)]
pub struct RateLimiters {
    pub chat: RateLimiter,
    pub upload: RateLimiter,
    pub list: RateLimiter,
    pub email: RateLimiter,
}

impl RateLimiters {
    pub fn new(
        chat: RateLimitConfig,
        upload: RateLimitConfig,
        list: RateLimitConfig,
        email: RateLimitConfig,
    ) -> Self {
        Self {
            chat: RateLimiter::new("chat", chat),
            upload: RateLimiter::new("upload", upload),
            list: RateLimiter::new("list", list),
            email: RateLimiter::new("email", email),
        }
    }

    pub fn all(&self) -> [&RateLimiter; 4] {
        [&self.chat, &self.upload, &self.list, &self.email]
    }
}
