//! Authoritative in-memory service registry.
//!
//! Holds every registered service keyed by sanitised name, together with a
//! per-service route index so the dispatcher resolves `(service, method,
//! path)` without scanning endpoint lists. All mutation happens under one
//! write lock; readers copy what they need and release before any I/O.
//!
//! Validation runs before the lock is taken. Each failure names the first
//! offending field so callers get an actionable 400 instead of a generic
//! rejection.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;

use svchub_common::clock::Clock;
use svchub_common::error::{HubError, Result};
use svchub_common::manifest::{
    Endpoint, EndpointManifest, HttpMethod, RegistrationRequest, ServiceRecord, ServiceStatus,
    DEFAULT_TIMEOUT_SECS, MAX_TIMEOUT_SECS, MIN_TIMEOUT_SECS,
};

/// Public path segments owned by the hub itself; a service can never shadow
/// them.
pub const RESERVED_NAMES: &[&str] = &["register"];

/// Whether an upsert inserted a new record or refreshed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertKind {
    Created,
    Refreshed,
}

/// Owned copy of everything the proxy needs for one forward.
///
/// Copying out of the registry is what keeps the lock released across the
/// upstream call.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteTarget {
    pub service: String,
    pub internal_url: String,
    pub endpoint_path: String,
    pub method: HttpMethod,
    pub timeout: Duration,
}

impl RouteTarget {
    pub fn timeout_secs(&self) -> u64 {
        self.timeout.as_secs()
    }
}

struct ServiceEntry {
    record: ServiceRecord,
    /// `(method, path)` to index into `record.endpoints`.
    routes: HashMap<(HttpMethod, String), usize>,
}

impl ServiceEntry {
    fn new(record: ServiceRecord) -> Self {
        let routes = record
            .endpoints
            .iter()
            .enumerate()
            .map(|(idx, ep)| ((ep.method, ep.path.clone()), idx))
            .collect();
        Self { record, routes }
    }
}

pub struct ServiceRegistry {
    clock: Arc<dyn Clock>,
    services: RwLock<HashMap<String, ServiceEntry>>,
}

impl ServiceRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            services: RwLock::new(HashMap::new()),
        }
    }

    /// Atomic replace-or-insert by sanitised name.
    ///
    /// Re-registration fully replaces `internal_url` and the endpoint list,
    /// refreshes `last_heartbeat`, and resets the status to `ACTIVE`;
    /// `first_seen` survives from the previous record. A concurrent `lookup`
    /// observes either the whole old record or the whole new one.
    pub async fn upsert(&self, request: &RegistrationRequest) -> Result<(ServiceRecord, UpsertKind)> {
        // CPU-only validation, done before the write lock is taken.
        let (name, internal_url, endpoints) = validate_registration(request)?;

        let now_mono = self.clock.now();
        let now_wall = self.clock.wall();

        let mut services = self.services.write().await;
        let (kind, first_seen, first_seen_mono) = match services.get(&name) {
            Some(existing) => (
                UpsertKind::Refreshed,
                existing.record.first_seen,
                existing.record.first_seen_mono,
            ),
            None => (UpsertKind::Created, now_wall, now_mono),
        };

        let record = ServiceRecord {
            name: name.clone(),
            internal_url,
            endpoints,
            first_seen,
            last_heartbeat: now_wall,
            status: ServiceStatus::Active,
            first_seen_mono,
            heartbeat_mono: now_mono,
        };
        services.insert(name, ServiceEntry::new(record.clone()));

        Ok((record, kind))
    }

    /// Resolves `(service, method, path)` to an owned forwarding target.
    ///
    /// Match is exact: no prefixes, no wildcards, trailing slash significant.
    /// Stale services still resolve; only eviction removes routes.
    pub async fn lookup(
        &self,
        service: &str,
        method: HttpMethod,
        path: &str,
    ) -> Option<RouteTarget> {
        let services = self.services.read().await;
        let entry = services.get(service)?;
        let idx = *entry.routes.get(&(method, path.to_string()))?;
        let endpoint = &entry.record.endpoints[idx];
        Some(RouteTarget {
            service: entry.record.name.clone(),
            internal_url: entry.record.internal_url.clone(),
            endpoint_path: endpoint.path.clone(),
            method,
            timeout: endpoint.timeout(),
        })
    }

    /// Transitions `ACTIVE -> STALE` for every record whose last heartbeat is
    /// older than `now - threshold`. Returns the transitioned names, sorted.
    pub async fn mark_stale_older_than(&self, threshold: Duration) -> Vec<String> {
        let now = self.clock.now();
        let mut services = self.services.write().await;
        let mut transitioned = Vec::new();
        for (name, entry) in services.iter_mut() {
            if entry.record.status == ServiceStatus::Active
                && now.saturating_sub(entry.record.heartbeat_mono) > threshold
            {
                entry.record.status = ServiceStatus::Stale;
                transitioned.push(name.clone());
            }
        }
        transitioned.sort();
        transitioned
    }

    /// Removes every record whose last heartbeat is older than
    /// `now - threshold`, regardless of status. Returns the evicted names,
    /// sorted. Once this returns, no lookup for an evicted name succeeds.
    pub async fn evict_older_than(&self, threshold: Duration) -> Vec<String> {
        let now = self.clock.now();
        let mut services = self.services.write().await;
        let mut evicted = Vec::new();
        services.retain(|name, entry| {
            if now.saturating_sub(entry.record.heartbeat_mono) > threshold {
                evicted.push(name.clone());
                false
            } else {
                true
            }
        });
        evicted.sort();
        evicted
    }

    /// Consistent copy of every record, sorted by name.
    pub async fn snapshot(&self) -> Vec<ServiceRecord> {
        let services = self.services.read().await;
        let mut records: Vec<ServiceRecord> =
            services.values().map(|entry| entry.record.clone()).collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }

    pub async fn service_count(&self) -> usize {
        self.services.read().await.len()
    }
}

/// Lowercases, collapses whitespace runs to `-`, and checks the permitted
/// charset (`[a-z0-9][a-z0-9-]*`). `None` when nothing valid remains.
pub fn sanitize_name(raw: &str) -> Option<String> {
    let name: String = raw
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");

    let mut chars = name.chars();
    let first = chars.next()?;
    if !first.is_ascii_lowercase() && !first.is_ascii_digit() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return None;
    }
    Some(name)
}

fn validate_registration(
    request: &RegistrationRequest,
) -> Result<(String, String, Vec<Endpoint>)> {
    let name = sanitize_name(&request.name).ok_or_else(|| {
        HubError::InvalidRegistration(format!(
            "name: '{}' is not a valid service name",
            request.name
        ))
    })?;
    if RESERVED_NAMES.contains(&name.as_str()) {
        return Err(HubError::ReservedName(format!(
            "name: '{name}' is a reserved path segment"
        )));
    }

    let internal_url = validate_internal_url(&request.internal_url)?;

    if request.endpoints.is_empty() {
        return Err(HubError::InvalidRegistration(
            "endpoints: at least one endpoint is required".into(),
        ));
    }
    let mut seen: HashSet<(HttpMethod, &str)> = HashSet::new();
    let mut endpoints = Vec::with_capacity(request.endpoints.len());
    for (idx, manifest) in request.endpoints.iter().enumerate() {
        let endpoint = validate_endpoint(idx, manifest)?;
        if !seen.insert((endpoint.method, manifest.path.as_str())) {
            return Err(HubError::InvalidRegistration(format!(
                "endpoints[{idx}]: duplicate route {} {}",
                endpoint.method, endpoint.path
            )));
        }
        endpoints.push(endpoint);
    }

    Ok((name, internal_url, endpoints))
}

/// Accepts absolute `http`/`https` URLs with a host and nothing after the
/// authority. A lone trailing `/` is dropped before storage; a missing scheme
/// is rejected, never inferred.
fn validate_internal_url(raw: &str) -> Result<String> {
    let uri: hyper::Uri = raw.parse().map_err(|e| {
        HubError::InvalidRegistration(format!("internal_url: '{raw}' does not parse: {e}"))
    })?;

    match uri.scheme_str() {
        Some("http") | Some("https") => {}
        Some(other) => {
            return Err(HubError::InvalidRegistration(format!(
                "internal_url: unsupported scheme '{other}'"
            )))
        }
        None => {
            return Err(HubError::InvalidRegistration(
                "internal_url: missing scheme, expected http:// or https://".into(),
            ))
        }
    }

    if uri.host().map_or(true, str::is_empty) {
        return Err(HubError::InvalidRegistration(
            "internal_url: missing host".into(),
        ));
    }

    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("");
    if !path_and_query.is_empty() && path_and_query != "/" {
        return Err(HubError::InvalidRegistration(
            "internal_url: must not carry a path, query, or fragment".into(),
        ));
    }

    Ok(raw.trim_end_matches('/').to_string())
}

fn validate_endpoint(idx: usize, manifest: &EndpointManifest) -> Result<Endpoint> {
    let path = manifest.path.as_str();
    if !path.starts_with('/') {
        return Err(HubError::InvalidRegistration(format!(
            "endpoints[{idx}].path: '{path}' must begin with '/'"
        )));
    }
    if path.contains("//") {
        return Err(HubError::InvalidRegistration(format!(
            "endpoints[{idx}].path: '{path}' must not contain duplicate slashes"
        )));
    }
    if path.contains('?') || path.contains('#') {
        return Err(HubError::InvalidRegistration(format!(
            "endpoints[{idx}].path: '{path}' must not carry a query or fragment"
        )));
    }

    let method = match &manifest.method {
        None => HttpMethod::Post,
        Some(raw) => HttpMethod::parse(raw).ok_or_else(|| {
            HubError::InvalidRegistration(format!(
                "endpoints[{idx}].method: '{raw}' is not one of GET, POST, PUT, DELETE, PATCH"
            ))
        })?,
    };

    let timeout_secs = match manifest.timeout {
        None => DEFAULT_TIMEOUT_SECS,
        Some(t) if (MIN_TIMEOUT_SECS as i64..=MAX_TIMEOUT_SECS as i64).contains(&t) => t as u64,
        Some(t) => {
            return Err(HubError::InvalidRegistration(format!(
                "endpoints[{idx}].timeout: {t} is outside [{MIN_TIMEOUT_SECS}, {MAX_TIMEOUT_SECS}] seconds"
            )))
        }
    };

    let input_schema = match &manifest.input_schema {
        None => Value::Object(Default::default()),
        Some(value) if value.is_object() => value.clone(),
        Some(_) => {
            return Err(HubError::InvalidRegistration(format!(
                "endpoints[{idx}].input_schema: must be an object"
            )))
        }
    };

    Ok(Endpoint {
        path: manifest.path.clone(),
        method,
        timeout_secs,
        description: manifest.description.clone().unwrap_or_default(),
        input_schema,
    })
}
