//! Request forwarding (reverse-proxy passthrough).
//!
//! # Responsibilities
//! - Capture the inbound request once so it can be replayed on failover
//! - Rewrite the target URI onto the selected backend
//! - Strip hop-by-hop headers, append `x-forwarded-for`
//! - Stream the upstream response back unmodified
//! - Release the backend's connection slot when the response completes
//!
//! # Design Decisions
//! - Upstream requests are always HTTP/1.1 over plain TCP
//! - The request body is buffered (bounded) so both attempts send the same bytes
//! - Upstream status codes are passed through; only transport errors fail over

use std::net::IpAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, Uri, Version};
use axum::response::{IntoResponse, Response};
use http_body_util::LengthLimitError;
use hyper::body::{Body as HttpBody, Frame, Incoming, SizeHint};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::Url;

use crate::http::failover;
use crate::http::request::request_id;
use crate::http::response::Unavailable;
use crate::load_balancer::backend::{Backend, BackendConnectionGuard};
use crate::load_balancer::ServerPool;
use crate::observability::metrics;

/// Headers that apply to a single connection and are never forwarded.
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Error produced while forwarding to one backend.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("invalid upstream request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("upstream transport error: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),
}

/// A failed attempt: which backend failed and why.
///
/// The backend's connection slot has already been released.
#[derive(Debug)]
pub struct ForwardFailure {
    pub backend: Arc<Backend>,
    pub error: ForwardError,
}

/// An inbound request captured for (re)forwarding.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    request_id: String,
}

impl ForwardRequest {
    /// Buffer the inbound request, at most `max_body_bytes` of body.
    pub async fn from_request(
        request: Request<Body>,
        max_body_bytes: usize,
        client_ip: Option<IpAddr>,
    ) -> Result<Self, axum::Error> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, max_body_bytes).await?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        if let Some(ip) = client_ip {
            append_forwarded_for(&mut headers, ip);
        }

        Ok(Self {
            request_id: request_id(&headers),
            method: parts.method,
            uri: parts.uri,
            headers,
            body,
        })
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Build the upstream request for `backend`.
    fn build_for(&self, backend: &Backend) -> Result<Request<Body>, axum::http::Error> {
        let uri = target_uri(&backend.url, &self.uri)?;

        let mut builder = Request::builder()
            .method(self.method.clone())
            .uri(uri)
            .version(Version::HTTP_11);
        if let Some(headers) = builder.headers_mut() {
            headers.extend(self.headers.clone());
        }
        builder.body(Body::from(self.body.clone()))
    }
}

/// Whether a body read failed because it exceeded the buffering limit,
/// as opposed to the client aborting or sending a malformed body.
pub fn exceeds_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

/// Join the backend base URL with the inbound path and query.
///
/// `http://b:81/api` + `/users?id=1` → `http://b:81/api/users?id=1`
pub fn target_uri(base: &Url, inbound: &Uri) -> Result<Uri, axum::http::uri::InvalidUri> {
    let base_path = base.path();
    let req_path = inbound.path();
    let path = match (base_path.ends_with('/'), req_path.starts_with('/')) {
        (true, true) => format!("{}{}", base_path, &req_path[1..]),
        (false, false) => format!("{}/{}", base_path, req_path),
        _ => format!("{}{}", base_path, req_path),
    };

    let query = match (base.query(), inbound.query()) {
        (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => format!("?{}&{}", a, b),
        (Some(a), _) if !a.is_empty() => format!("?{}", a),
        (_, Some(b)) if !b.is_empty() => format!("?{}", b),
        _ => String::new(),
    };

    // A hostless base yields an unparseable URI rather than a guessed host.
    let host = base.host_str().unwrap_or_default();
    let authority = match base.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    format!("{}://{}{}{}", base.scheme(), authority, path, query).parse()
}

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    for name in listed {
        headers.remove(name.as_str());
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, ip: IpAddr) {
    let prior: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    let value = if prior.is_empty() {
        ip.to_string()
    } else {
        format!("{}, {}", prior.join(", "), ip)
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert("x-forwarded-for", value);
    }
}

/// Response body that holds the backend's connection slot until the body
/// has been fully streamed or dropped.
struct TrackedBody {
    inner: Incoming,
    _guard: BackendConnectionGuard,
}

impl HttpBody for TrackedBody {
    type Data = Bytes;
    type Error = hyper::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.get_mut().inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Selects peers and forwards requests, with one failover attempt.
#[derive(Clone)]
pub struct Dispatcher {
    pool: Arc<ServerPool>,
    client: Client<HttpConnector, Body>,
}

impl Dispatcher {
    pub fn new(pool: Arc<ServerPool>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { pool, client }
    }

    pub fn pool(&self) -> &Arc<ServerPool> {
        &self.pool
    }

    /// Serve one inbound request end to end.
    pub async fn dispatch(&self, request: ForwardRequest) -> Response {
        match self.pool.next_peer() {
            Some(guard) => failover::forward_with_failover(self, guard, &request).await,
            None => {
                tracing::warn!(request_id = %request.request_id, "No alive backend for request");
                Unavailable::NoPeer.into_response()
            }
        }
    }

    /// Forward once to the backend held by `guard`.
    ///
    /// On success the guard moves into the response body; on failure it is
    /// dropped before returning.
    pub async fn forward(
        &self,
        guard: BackendConnectionGuard,
        request: &ForwardRequest,
    ) -> Result<Response, ForwardFailure> {
        let start = Instant::now();
        let backend = guard.backend().clone();

        tracing::info!(
            request_id = %request.request_id,
            method = %request.method,
            backend = %backend.authority,
            active_connections = backend.active_connections(),
            "Forwarding request"
        );

        let result = match request.build_for(&backend) {
            Ok(upstream) => self.client.request(upstream).await.map_err(ForwardError::from),
            Err(e) => Err(ForwardError::from(e)),
        };

        match result {
            Ok(response) => {
                metrics::record_request(backend.url.as_str(), response.status().as_u16(), start);
                let (mut parts, body) = response.into_parts();
                strip_hop_by_hop(&mut parts.headers);
                let body = TrackedBody {
                    inner: body,
                    _guard: guard,
                };
                Ok(Response::from_parts(parts, Body::new(body)))
            }
            Err(error) => {
                drop(guard);
                metrics::record_transport_error(backend.url.as_str(), start);
                Err(ForwardFailure { backend, error })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn joins_paths_with_single_slash() {
        let base = Url::parse("http://127.0.0.1:8081").unwrap();
        assert_eq!(
            target_uri(&base, &uri("/users/7?x=1")).unwrap().to_string(),
            "http://127.0.0.1:8081/users/7?x=1"
        );

        let base = Url::parse("http://127.0.0.1:8081/api/").unwrap();
        assert_eq!(
            target_uri(&base, &uri("/users")).unwrap().to_string(),
            "http://127.0.0.1:8081/api/users"
        );

        let base = Url::parse("http://127.0.0.1:8081/api").unwrap();
        assert_eq!(
            target_uri(&base, &uri("/users")).unwrap().to_string(),
            "http://127.0.0.1:8081/api/users"
        );
    }

    #[test]
    fn merges_queries() {
        let base = Url::parse("http://backend:9000/?key=abc").unwrap();
        assert_eq!(
            target_uri(&base, &uri("/search?q=rust")).unwrap().to_string(),
            "http://backend:9000/search?key=abc&q=rust"
        );
    }

    #[test]
    fn strips_hop_by_hop_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-private"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-private", HeaderValue::from_static("secret"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(header::CONTENT_TYPE));
    }

    #[test]
    fn appends_forwarded_for() {
        let mut headers = HeaderMap::new();
        append_forwarded_for(&mut headers, "10.0.0.1".parse().unwrap());
        assert_eq!(headers["x-forwarded-for"], "10.0.0.1");

        append_forwarded_for(&mut headers, "10.0.0.2".parse().unwrap());
        assert_eq!(headers["x-forwarded-for"], "10.0.0.1, 10.0.0.2");
    }

    #[tokio::test]
    async fn captures_request_once() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/submit?draft=1")
            .header("x-request-id", "req-1")
            .header(header::CONNECTION, "close")
            .body(Body::from("payload"))
            .unwrap();

        let forward = ForwardRequest::from_request(request, 1024, Some("127.0.0.1".parse().unwrap()))
            .await
            .unwrap();
        assert_eq!(forward.request_id(), "req-1");

        let backend = Backend::new(Url::parse("http://127.0.0.1:9000").unwrap()).unwrap();
        let upstream = forward.build_for(&backend).unwrap();
        assert_eq!(upstream.method(), Method::POST);
        assert_eq!(upstream.uri().to_string(), "http://127.0.0.1:9000/submit?draft=1");
        assert_eq!(upstream.version(), Version::HTTP_11);
        assert!(!upstream.headers().contains_key(header::CONNECTION));
        assert_eq!(upstream.headers()["x-forwarded-for"], "127.0.0.1");

        let body = axum::body::to_bytes(upstream.into_body(), 1024).await.unwrap();
        assert_eq!(body, "payload".as_bytes());
    }

    #[tokio::test]
    async fn rejects_oversized_body() {
        let request = Request::builder()
            .uri("/")
            .body(Body::from(vec![0u8; 64]))
            .unwrap();
        let err = ForwardRequest::from_request(request, 16, None).await.unwrap_err();
        assert!(exceeds_limit(&err));
    }

    #[tokio::test]
    async fn aborted_body_is_not_a_limit_error() {
        let chunks = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];
        let request = Request::builder()
            .method(Method::POST)
            .uri("/")
            .body(Body::from_stream(futures_util::stream::iter(chunks)))
            .unwrap();

        let err = ForwardRequest::from_request(request, 1024, None).await.unwrap_err();
        assert!(!exceeds_limit(&err));
    }
}
