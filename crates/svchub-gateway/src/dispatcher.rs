//! Route dispatcher.
//!
//! Translates a public path of the form `/<service>/<endpoint-path>` into a
//! registry lookup and hands resolved requests to the proxy. Matching is
//! strict: exact `(method, path)`, trailing slash significant, no prefixes.
//! The registry lock is released before the proxy runs; the dispatcher only
//! carries an owned [`RouteTarget`] across the upstream call.

use axum::http::Method;
use axum::response::Response;
use hyper::body::Bytes;
use hyper::header::HeaderMap;
use std::sync::Arc;

use svchub_common::error::HubError;
use svchub_common::logring::{LogCategory, LogContext, LogLevel, LogRing};
use svchub_common::manifest::HttpMethod;

use crate::proxy::{error_response, Proxy};
use crate::registry::ServiceRegistry;

pub struct Dispatcher {
    registry: Arc<ServiceRegistry>,
    log: Arc<LogRing>,
    proxy: Proxy,
}

impl Dispatcher {
    pub fn new(registry: Arc<ServiceRegistry>, log: Arc<LogRing>, proxy: Proxy) -> Self {
        Self {
            registry,
            log,
            proxy,
        }
    }

    /// Handles one public request that matched no reserved route.
    pub async fn dispatch(
        &self,
        method: &Method,
        path: &str,
        query: Option<&str>,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Response {
        let Some(hub_method) = from_wire_method(method) else {
            return self.no_route(method, path);
        };
        let Some((service, endpoint_path)) = split_public_path(path) else {
            return self.no_route(method, path);
        };

        match self.registry.lookup(service, hub_method, endpoint_path).await {
            Some(target) => self.proxy.forward(&target, query, headers, body).await,
            None => self.no_route(method, path),
        }
    }

    fn no_route(&self, method: &Method, path: &str) -> Response {
        let err = HubError::NoRoute(format!("{method} {path} is not registered"));
        self.log.record(
            LogLevel::Warning,
            LogCategory::Reject,
            format!("No route for {method} {path}"),
            Some(LogContext {
                service: split_public_path(path).map(|(service, _)| service.to_string()),
                ..Default::default()
            }),
        );
        error_response(&err)
    }
}

/// Splits `/<service>/<rest...>` into the service segment and the endpoint
/// path (leading `/` preserved). `None` when there is no endpoint segment.
fn split_public_path(path: &str) -> Option<(&str, &str)> {
    let rest = path.strip_prefix('/')?;
    let slash = rest.find('/')?;
    let (service, endpoint) = rest.split_at(slash);
    if service.is_empty() {
        return None;
    }
    Some((service, endpoint))
}

fn from_wire_method(method: &Method) -> Option<HttpMethod> {
    HttpMethod::parse(method.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_public_path() {
        assert_eq!(split_public_path("/echo/ping"), Some(("echo", "/ping")));
        assert_eq!(
            split_public_path("/echo/v1/run"),
            Some(("echo", "/v1/run"))
        );
        assert_eq!(split_public_path("/echo/ping/"), Some(("echo", "/ping/")));
    }

    #[test]
    fn test_split_public_path_without_endpoint_segment() {
        assert_eq!(split_public_path("/echo"), None);
        assert_eq!(split_public_path("/"), None);
        assert_eq!(split_public_path(""), None);
        assert_eq!(split_public_path("//ping"), None);
    }

    #[test]
    fn test_from_wire_method_allowed_set() {
        assert_eq!(from_wire_method(&Method::GET), Some(HttpMethod::Get));
        assert_eq!(from_wire_method(&Method::DELETE), Some(HttpMethod::Delete));
        assert_eq!(from_wire_method(&Method::HEAD), None);
        assert_eq!(from_wire_method(&Method::OPTIONS), None);
    }
}
