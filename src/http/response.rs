//! Failure responses.
//!
//! Clients never see a raw transport error from the balancer. When no
//! upstream response can be produced they get a 503 with one of three
//! fixed bodies.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

/// Why a request could not be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Unavailable {
    /// Nothing alive when the request arrived.
    #[error("Service not available")]
    NoPeer,
    /// The first attempt failed and no other backend is alive.
    #[error("Service Unavailable (No healthy backends)")]
    NoHealthyBackends,
    /// The single retry failed too.
    #[error("Service Unavailable (Max retries reached)")]
    MaxRetries,
}

impl IntoResponse for Unavailable {
    fn into_response(self) -> Response {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}
