//! Forwarding proxy.
//!
//! Executes exactly one forwarding attempt for a resolved route and renders
//! the outcome as the client-visible response. No retries, no buffering
//! beyond the bounded body, and exactly one `FORWARD` log entry per attempt.

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::Method;
use axum::response::Response;
use hyper::body::Bytes;
use hyper::header::HeaderMap;
use std::sync::Arc;
use std::time::Instant;

use svchub_common::error::HubError;
use svchub_common::logring::{LogCategory, LogContext, LogLevel, LogRing};
use svchub_common::manifest::HttpMethod;
use svchub_common::upstream::{Outcome, UpstreamClient};

use crate::registry::RouteTarget;

/// Headers never forwarded upstream. `Host` and `Content-Length` are
/// recomputed by the client; the rest are hop-by-hop.
const STRIPPED_HEADERS: &[&str] = &[
    "host",
    "connection",
    "keep-alive",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

pub struct Proxy {
    client: UpstreamClient,
    log: Arc<LogRing>,
}

impl Proxy {
    pub fn new(client: UpstreamClient, log: Arc<LogRing>) -> Self {
        Self { client, log }
    }

    /// One forwarding attempt.
    ///
    /// The target URL is `internal_url + endpoint_path`, with the inbound
    /// query string appended verbatim when present. Any HTTP status from the
    /// upstream is passed through as received; only transport failures map to
    /// gateway errors.
    pub async fn forward(
        &self,
        target: &RouteTarget,
        query: Option<&str>,
        inbound_headers: &HeaderMap,
        body: Bytes,
    ) -> Response {
        let url = compose_url(target, query);
        let started = Instant::now();

        let outcome = self
            .client
            .call(
                to_wire_method(target.method),
                &url,
                outbound_headers(inbound_headers),
                body,
                target.timeout,
            )
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Outcome::Ok {
                status,
                headers,
                body,
            } => {
                self.log.record(
                    LogLevel::Info,
                    LogCategory::Forward,
                    format!(
                        "{} {} -> {} in {}ms",
                        target.method,
                        url,
                        status.as_u16(),
                        elapsed_ms
                    ),
                    Some(LogContext {
                        service: Some(target.service.clone()),
                        upstream: Some(url.clone()),
                        latency_ms: Some(elapsed_ms),
                        status: Some(status.as_u16()),
                    }),
                );

                let mut builder = Response::builder().status(status);
                if let Some(content_type) = headers.get(CONTENT_TYPE) {
                    builder = builder.header(CONTENT_TYPE, content_type.clone());
                }
                builder.body(Body::from(body)).unwrap()
            }
            Outcome::Timeout => {
                self.forward_failed(target, &url, elapsed_ms, HubError::UpstreamTimeout(target.timeout_secs()))
            }
            Outcome::Unreachable { cause } => {
                self.forward_failed(target, &url, elapsed_ms, HubError::UpstreamUnreachable(cause))
            }
            Outcome::Malformed { cause } => {
                self.forward_failed(target, &url, elapsed_ms, HubError::UpstreamMalformed(cause))
            }
        }
    }

    fn forward_failed(
        &self,
        target: &RouteTarget,
        url: &str,
        elapsed_ms: u64,
        err: HubError,
    ) -> Response {
        self.log.record(
            LogLevel::Warning,
            LogCategory::Forward,
            format!("{} {} -> {} in {}ms", target.method, url, err.kind(), elapsed_ms),
            Some(LogContext {
                service: Some(target.service.clone()),
                upstream: Some(url.to_string()),
                latency_ms: Some(elapsed_ms),
                status: None,
            }),
        );
        error_response(&err)
    }
}

/// Renders a gateway error as its JSON wire response.
pub fn error_response(err: &HubError) -> Response {
    let body = serde_json::to_vec(&err.wire_body()).unwrap_or_default();
    Response::builder()
        .status(err.status())
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn compose_url(target: &RouteTarget, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => {
            format!("{}{}?{}", target.internal_url, target.endpoint_path, q)
        }
        _ => format!("{}{}", target.internal_url, target.endpoint_path),
    }
}

/// Inbound headers minus the stripped set; `Proxy-*` is dropped as a prefix.
fn outbound_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in inbound {
        let lower = name.as_str();
        if STRIPPED_HEADERS.contains(&lower) || lower.starts_with("proxy-") {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

fn to_wire_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Patch => Method::PATCH,
    }
}
