use hyper::StatusCode;
use thiserror::Error;

/// Gateway error taxonomy.
///
/// Every variant maps to a stable wire tag and an HTTP status; forwarding
/// failures are classified here rather than bubbled up as transport errors.
#[derive(Error, Debug)]
pub enum HubError {
    #[error("Invalid registration: {0}")]
    InvalidRegistration(String),

    #[error("Reserved service name: {0}")]
    ReservedName(String),

    #[error("No route: {0}")]
    NoRoute(String),

    #[error("Upstream timeout after {0}s")]
    UpstreamTimeout(u64),

    #[error("Upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("Malformed upstream response: {0}")]
    UpstreamMalformed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HubError {
    /// Stable machine-readable tag carried in wire responses.
    pub fn kind(&self) -> &'static str {
        match self {
            HubError::InvalidRegistration(_) => "INVALID_REGISTRATION",
            HubError::ReservedName(_) => "RESERVED_NAME",
            HubError::NoRoute(_) => "NO_ROUTE",
            HubError::UpstreamTimeout(_) => "UPSTREAM_TIMEOUT",
            HubError::UpstreamUnreachable(_) => "UPSTREAM_UNREACHABLE",
            HubError::UpstreamMalformed(_) => "UPSTREAM_MALFORMED",
            HubError::Internal(_) => "INTERNAL",
        }
    }

    /// HTTP status the gateway answers with for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            HubError::InvalidRegistration(_) | HubError::ReservedName(_) => {
                StatusCode::BAD_REQUEST
            }
            HubError::NoRoute(_) => StatusCode::NOT_FOUND,
            HubError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            HubError::UpstreamUnreachable(_) | HubError::UpstreamMalformed(_) => {
                StatusCode::BAD_GATEWAY
            }
            HubError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short human summary, the `error` field of the wire body.
    pub fn summary(&self) -> &'static str {
        match self {
            HubError::InvalidRegistration(_) => "Invalid registration",
            HubError::ReservedName(_) => "Reserved service name",
            HubError::NoRoute(_) => "No route",
            HubError::UpstreamTimeout(_) => "Upstream timeout",
            HubError::UpstreamUnreachable(_) => "Internal service error",
            HubError::UpstreamMalformed(_) => "Malformed upstream response",
            HubError::Internal(_) => "Internal error",
        }
    }

    /// The `details` field of the wire body.
    pub fn details(&self) -> String {
        match self {
            HubError::InvalidRegistration(d)
            | HubError::ReservedName(d)
            | HubError::NoRoute(d)
            | HubError::UpstreamUnreachable(d)
            | HubError::UpstreamMalformed(d)
            | HubError::Internal(d) => d.clone(),
            HubError::UpstreamTimeout(secs) => format!("{secs}s"),
        }
    }

    /// JSON body answered to the caller: `{"error", "details", "kind"}`.
    pub fn wire_body(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.summary(),
            "details": self.details(),
            "kind": self.kind(),
        })
    }
}

pub type Result<T> = std::result::Result<T, HubError>;
