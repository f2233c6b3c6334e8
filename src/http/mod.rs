//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → forward.rs (buffer request, pick peer, forward, stream response)
//!     → failover.rs (on transport error: mark dead, retry once)
//!     → response.rs (503 bodies when nothing could serve the request)
//!     → Send to client
//! ```

pub mod failover;
pub mod forward;
pub mod request;
pub mod response;
pub mod server;

pub use forward::{Dispatcher, ForwardRequest};
pub use request::{UuidRequestId, X_REQUEST_ID};
pub use response::Unavailable;
pub use server::HttpServer;
