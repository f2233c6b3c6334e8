//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with a catch-all proxy handler
//! - Wire up middleware (request ID, tracing)
//! - Bind server to listener
//! - Spawn the health monitor alongside the server
//! - Dispatch requests to the pool with failover

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::BalancerConfig;
use crate::health::HealthMonitor;
use crate::http::forward::{exceeds_limit, Dispatcher, ForwardRequest};
use crate::http::request::{UuidRequestId, X_REQUEST_ID};
use crate::load_balancer::ServerPool;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub max_body_bytes: usize,
}

/// HTTP server for the load balancer.
pub struct HttpServer {
    router: Router,
    config: BalancerConfig,
    pool: Arc<ServerPool>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: BalancerConfig) -> Self {
        let pool = Arc::new(ServerPool::from_config(&config));

        let state = AppState {
            dispatcher: Dispatcher::new(pool.clone()),
            max_body_bytes: config.proxy.max_body_bytes,
        };

        let router = Self::build_router(state);
        Self {
            router,
            config,
            pool,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID)),
            )
    }

    /// Run the server, accepting connections on the given listener, until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backends = self.pool.len(),
            policy = self.pool.policy_name(),
            "HTTP server starting"
        );

        let monitor = HealthMonitor::new(self.pool.clone(), self.config.health_check.clone())
            .spawn(shutdown.resubscribe());

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        // Serve with graceful shutdown
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        if let Err(e) = monitor.await {
            tracing::error!(error = %e, "Health monitor task failed");
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The backend pool shared by the handler and the health monitor.
    pub fn pool(&self) -> Arc<ServerPool> {
        self.pool.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }
}

/// Main proxy handler.
/// Buffers the request, selects a backend and forwards with failover.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let forward = match ForwardRequest::from_request(request, state.max_body_bytes, client_ip).await {
        Ok(forward) => forward,
        Err(e) if exceeds_limit(&e) => {
            tracing::warn!(limit = state.max_body_bytes, "Request body too large");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not read request body");
            return (StatusCode::BAD_REQUEST, "Could not read request body").into_response();
        }
    };

    state.dispatcher.dispatch(forward).await
}
