//! Ingress HTTP surface.
//!
//! Three surface elements on one axum router: `POST /register`, the `GET /`
//! dashboard, and a catch-all fallback that delegates every other path to the
//! dispatcher. Registration bodies are read as raw bytes and parsed
//! explicitly so malformed JSON maps to `INVALID_REGISTRATION` instead of a
//! framework rejection. Panics at the request boundary become the `INTERNAL`
//! wire error.

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tracing::info;

use svchub_common::error::{HubError, Result};
use svchub_common::logring::{LogCategory, LogContext, LogLevel};
use svchub_common::manifest::{RegistrationRequest, RegistrationResponse};
use svchub_common::upstream::MAX_RESPONSE_BYTES;

use crate::gateway::Gateway;
use crate::proxy::error_response;
use crate::registry::UpsertKind;

/// Builds the public router for a gateway.
pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/register", post(handle_register))
        .route("/", get(handle_dashboard))
        .fallback(handle_public)
        .layer(CorsLayer::permissive())
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(gateway)
}

/// HTTP server for the gateway, listening on every given address at once
/// (loopback on both families in the default deployment).
pub struct HttpServer {
    gateway: Arc<Gateway>,
}

impl HttpServer {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    /// Binds all addresses and serves until ctrl-c. Any bind failure aborts
    /// startup; serving errors after that are returned as `INTERNAL`.
    pub async fn run(self, addrs: &[SocketAddr]) -> Result<()> {
        let app = router(self.gateway.clone());

        let mut listeners = Vec::with_capacity(addrs.len());
        for addr in addrs {
            let listener = TcpListener::bind(addr).await.map_err(|e| {
                HubError::Internal(format!("failed to bind {addr}: {e}"))
            })?;
            info!("svchub listening on {addr}");
            listeners.push(listener);
        }

        let mut tasks = Vec::with_capacity(listeners.len());
        for listener in listeners {
            let app = app.clone();
            tasks.push(tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown_signal())
                    .await
            }));
        }

        for task in tasks {
            task.await
                .map_err(|e| HubError::Internal(format!("server task failed: {e}")))?
                .map_err(|e| HubError::Internal(format!("server error: {e}")))?;
        }

        self.gateway.shutdown();
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

async fn handle_register(State(gateway): State<Arc<Gateway>>, body: Bytes) -> Response {
    let request: RegistrationRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            let err = HubError::InvalidRegistration(format!("body: {e}"));
            gateway.log().record(
                LogLevel::Warning,
                LogCategory::Reject,
                format!("Registration rejected: {}", err.details()),
                None,
            );
            return error_response(&err);
        }
    };

    match gateway.registry().upsert(&request).await {
        Ok((record, kind)) => {
            let routes_created = record.endpoints.len();
            let verb = match kind {
                UpsertKind::Created => "registered",
                UpsertKind::Refreshed => "re-registered",
            };
            gateway.log().record(
                LogLevel::Info,
                LogCategory::Register,
                format!("Service '{}' {verb} with {routes_created} routes", record.name),
                Some(LogContext {
                    service: Some(record.name.clone()),
                    upstream: Some(record.internal_url.clone()),
                    ..Default::default()
                }),
            );

            let response = RegistrationResponse {
                status: "success",
                message: format!("Service '{}' registered", record.name),
                service: record,
                routes_created,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => {
            gateway.log().record(
                LogLevel::Warning,
                LogCategory::Reject,
                format!("Registration rejected: {}", err.details()),
                None,
            );
            error_response(&err)
        }
    }
}

async fn handle_dashboard(State(gateway): State<Arc<Gateway>>) -> Response {
    let records = gateway.registry().snapshot().await;
    let service_count = records.len();
    let services: serde_json::Map<String, serde_json::Value> = records
        .into_iter()
        .map(|record| {
            let name = record.name.clone();
            let value = serde_json::to_value(&record).unwrap_or(serde_json::Value::Null);
            (name, value)
        })
        .collect();

    let body = json!({
        "hub_status": "running",
        "mode": "service_registration",
        "services": services,
        "service_count": service_count,
        "logs": gateway.log().snapshot(),
        "endpoints": {
            "register": "POST /register - Register a service",
            "dashboard": "GET / - View this dashboard",
        },
    });
    (StatusCode::OK, Json(body)).into_response()
}

async fn handle_public(State(gateway): State<Arc<Gateway>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let body = match axum::body::to_bytes(body, MAX_RESPONSE_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return error_response(&HubError::Internal(format!(
                "request body could not be read: {e}"
            )))
        }
    };

    gateway
        .dispatcher()
        .dispatch(
            &parts.method,
            parts.uri.path(),
            parts.uri.query(),
            &parts.headers,
            body,
        )
        .await
}

fn panic_response(_err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    error_response(&HubError::Internal(
        "unexpected panic in request handler".into(),
    ))
}
