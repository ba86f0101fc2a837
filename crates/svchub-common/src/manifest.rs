//! Registration wire types and the stored service record.
//!
//! A service submits a [`RegistrationRequest`] to `POST /register`. Fields
//! arrive loosely typed (method as free string, timeout as any integer) so the
//! registry can reject bad values with a named field instead of a generic
//! deserialization failure. Once validated, endpoints become [`Endpoint`]
//! descriptors inside a [`ServiceRecord`], which is what the dashboard and the
//! registration response expose.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Endpoint timeout default, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Smallest accepted endpoint timeout.
pub const MIN_TIMEOUT_SECS: u64 = 1;
/// Largest accepted endpoint timeout.
pub const MAX_TIMEOUT_SECS: u64 = 600;

/// HTTP methods a service may register an endpoint under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }

    /// Case-insensitive parse; `None` for methods outside the allowed set.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "DELETE" => Some(HttpMethod::Delete),
            "PATCH" => Some(HttpMethod::Patch),
            _ => None,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unsupported HTTP method '{s}'"))
    }
}

/// One endpoint as submitted by a registering service.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointManifest {
    pub path: String,
    /// Defaults to POST when absent.
    pub method: Option<String>,
    /// Seconds; defaults to [`DEFAULT_TIMEOUT_SECS`]. Signed so that
    /// out-of-range values reach validation instead of failing to parse.
    pub timeout: Option<i64>,
    pub description: Option<String>,
    /// Opaque to the gateway; surfaced on the dashboard only.
    pub input_schema: Option<Value>,
}

/// Body of `POST /register`.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationRequest {
    pub name: String,
    pub internal_url: String,
    #[serde(default)]
    pub endpoints: Vec<EndpointManifest>,
}

/// A validated endpoint descriptor. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Endpoint {
    pub path: String,
    pub method: HttpMethod,
    #[serde(rename = "timeout")]
    pub timeout_secs: u64,
    pub description: String,
    pub input_schema: Value,
}

impl Endpoint {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Liveness state of a registered service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceStatus {
    Active,
    Stale,
}

/// The stored record for one registered service.
///
/// `first_seen`/`last_heartbeat` are wall-clock display values; the monotonic
/// twins (serde-skipped) are what staleness math compares against.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceRecord {
    pub name: String,
    pub internal_url: String,
    pub endpoints: Vec<Endpoint>,
    pub first_seen: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub status: ServiceStatus,
    #[serde(skip)]
    pub first_seen_mono: Duration,
    #[serde(skip)]
    pub heartbeat_mono: Duration,
}

/// Body of a successful `POST /register` reply.
#[derive(Debug, Serialize)]
pub struct RegistrationResponse {
    pub status: &'static str,
    pub message: String,
    pub service: ServiceRecord,
    pub routes_created: usize,
}
