//! Failover on forwarding errors.
//!
//! # Sequence
//! ```text
//! forward to peer ── ok ──▶ upstream response
//!        │
//!      error
//!        ▼
//! mark peer dead
//!        │
//! already retried? ── yes ──▶ 503 "Max retries reached"
//!        │ no
//! select another peer ── none ──▶ 503 "No healthy backends"
//!        │
//! forward again with the retry marker set
//! ```
//!
//! # Design Decisions
//! - The retry marker is an explicit value threaded through the loop
//! - At most one extra attempt per inbound request, never a retry of a retry

use axum::response::{IntoResponse, Response};

use crate::http::forward::{Dispatcher, ForwardRequest};
use crate::http::response::Unavailable;
use crate::load_balancer::backend::{Backend, BackendConnectionGuard};
use crate::load_balancer::ServerPool;
use crate::observability::metrics;

/// Whether this request has already used its one retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    First,
    Retried,
}

/// What to do after a forwarding failure.
#[derive(Debug)]
pub enum Recovery {
    /// Forward again to this (already reserved) peer.
    Retry(BackendConnectionGuard),
    /// Answer the client with a 503.
    GiveUp(Unavailable),
}

/// Mark `failed` dead and decide the next step.
pub fn recover(pool: &ServerPool, failed: &Backend, attempt: Attempt) -> Recovery {
    failed.set_alive(false);

    if attempt == Attempt::Retried {
        return Recovery::GiveUp(Unavailable::MaxRetries);
    }

    match pool.next_peer() {
        Some(peer) => Recovery::Retry(peer),
        None => Recovery::GiveUp(Unavailable::NoHealthyBackends),
    }
}

/// Forward `request` via `guard`, failing over once on a transport error.
pub async fn forward_with_failover(
    dispatcher: &Dispatcher,
    mut guard: BackendConnectionGuard,
    request: &ForwardRequest,
) -> Response {
    let mut attempt = Attempt::First;

    loop {
        let failure = match dispatcher.forward(guard, request).await {
            Ok(response) => return response,
            Err(failure) => failure,
        };

        tracing::warn!(
            request_id = %request.request_id(),
            backend = %failure.backend.authority,
            error = %failure.error,
            "Request failed"
        );

        match recover(dispatcher.pool(), &failure.backend, attempt) {
            Recovery::Retry(peer) => {
                tracing::info!(
                    request_id = %request.request_id(),
                    backend = %peer.authority,
                    "Retrying request"
                );
                metrics::record_failover();
                guard = peer;
                attempt = Attempt::Retried;
            }
            Recovery::GiveUp(reason) => {
                tracing::warn!(request_id = %request.request_id(), %reason, "Giving up");
                return reason.into_response();
            }
        }
    }
}
