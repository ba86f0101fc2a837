//! Outbound HTTP client for forwarding.
//!
//! A thin wrapper over hyper's pooled HTTP/1.1 client. One call, one
//! [`Outcome`]: any HTTP status counts as `Ok`; everything else is a
//! transport-level classification the proxy maps to a gateway error. The
//! supplied timeout is a total wall-clock bound covering connect, send, and
//! full body receive.

use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Bytes;
use hyper::header::HeaderMap;
use hyper::{Method, Request, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::error::Error as StdError;
use std::time::Duration;

/// Response bodies are read into memory up to this cap (10 MiB).
pub const MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

/// Result of one upstream call.
#[derive(Debug)]
pub enum Outcome {
    /// Response received, any status. Non-2xx is still `Ok` here.
    Ok {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    },
    /// Deadline elapsed before the response completed.
    Timeout,
    /// DNS failure, connection refused, or connection reset.
    Unreachable { cause: String },
    /// A response arrived but could not be consumed (parse failure or body
    /// over the cap).
    Malformed { cause: String },
}

pub struct UpstreamClient {
    inner: Client<HttpConnector, Full<Bytes>>,
    body_cap: usize,
}

impl UpstreamClient {
    pub fn new() -> Self {
        Self::with_body_cap(MAX_RESPONSE_BYTES)
    }

    pub fn with_body_cap(body_cap: usize) -> Self {
        Self {
            inner: Client::builder(TokioExecutor::new()).build_http(),
            body_cap,
        }
    }

    /// Issues one request and classifies the result.
    ///
    /// `headers` is taken as-is; the caller is responsible for hop-by-hop
    /// filtering. `Host` and `Content-Length` are filled in by hyper.
    pub async fn call(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Bytes,
        timeout: Duration,
    ) -> Outcome {
        let uri: Uri = match url.parse() {
            Ok(uri) => uri,
            Err(e) => {
                return Outcome::Unreachable {
                    cause: format!("invalid upstream url '{url}': {e}"),
                }
            }
        };

        let mut request = match Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(body))
        {
            Ok(req) => req,
            Err(e) => {
                return Outcome::Unreachable {
                    cause: format!("could not build upstream request: {e}"),
                }
            }
        };
        *request.headers_mut() = headers;

        match tokio::time::timeout(timeout, self.execute(request)).await {
            Ok(outcome) => outcome,
            Err(_) => Outcome::Timeout,
        }
    }

    async fn execute(&self, request: Request<Full<Bytes>>) -> Outcome {
        let response = match self.inner.request(request).await {
            Ok(response) => response,
            Err(e) => return classify_client_error(&e),
        };

        let (parts, body) = response.into_parts();
        match Limited::new(body, self.body_cap).collect().await {
            Ok(collected) => Outcome::Ok {
                status: parts.status,
                headers: parts.headers,
                body: collected.to_bytes(),
            },
            Err(e) => {
                let cause = if e.downcast_ref::<http_body_util::LengthLimitError>().is_some() {
                    format!("response body exceeds {} byte cap", self.body_cap)
                } else {
                    format!("failed reading response body: {e}")
                };
                Outcome::Malformed { cause }
            }
        }
    }
}

impl Default for UpstreamClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits hyper client failures into `Unreachable` vs `Malformed`.
///
/// Connect-phase failures (DNS, refused, reset during handshake) are
/// unreachable; a peer that answered with bytes hyper cannot parse is
/// malformed.
fn classify_client_error(err: &hyper_util::client::legacy::Error) -> Outcome {
    if err.is_connect() {
        return Outcome::Unreachable {
            cause: root_cause(err),
        };
    }

    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(inner) = source {
        if let Some(hyper_err) = inner.downcast_ref::<hyper::Error>() {
            if hyper_err.is_parse() || hyper_err.is_incomplete_message() {
                return Outcome::Malformed {
                    cause: root_cause(err),
                };
            }
        }
        source = inner.source();
    }

    Outcome::Unreachable {
        cause: root_cause(err),
    }
}

/// Innermost error message in the chain, which names the actual failure
/// ("Connection refused") instead of hyper's wrapper text.
fn root_cause(err: &dyn StdError) -> String {
    let mut current: &dyn StdError = err;
    while let Some(inner) = current.source() {
        current = inner;
    }
    current.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_cause_unwraps_nested_errors() {
        let inner = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(root_cause(&inner), "refused");
    }

    #[tokio::test]
    async fn test_call_rejects_unparseable_url() {
        let client = UpstreamClient::new();
        let outcome = client
            .call(
                Method::GET,
                "http://exa mple/bad",
                HeaderMap::new(),
                Bytes::new(),
                Duration::from_secs(1),
            )
            .await;
        assert!(matches!(outcome, Outcome::Unreachable { .. }));
    }
}
