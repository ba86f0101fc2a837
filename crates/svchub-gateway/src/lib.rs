//! svchub gateway core.
//!
//! A dynamic reverse-proxy hub for internal microservices. Services register
//! themselves over HTTP, declaring the endpoints they expose; the hub resolves
//! public paths of the form `/<service>/<endpoint>` against the registry at
//! request time and forwards to the registered internal address. Liveness is
//! heartbeat-driven: re-registration refreshes a service, and a background
//! sweeper marks quiet services stale before evicting them.
//!
//! # Components
//!
//! - [`registry`]: the authoritative in-memory service store
//! - [`dispatcher`]: public path resolution against the registry
//! - [`proxy`]: single-attempt forwarding with timeout and error mapping
//! - [`sweeper`]: the background stale/evict loop
//! - [`http_server`]: the axum ingress (`/register`, `/`, catch-all)
//! - [`gateway`]: wiring of all of the above around one injected clock
//!
//! # Concurrency
//!
//! The registry is the only shared-mutable state visible to requests. All
//! mutation happens under its write lock; lookups copy the forwarding target
//! out and release the lock before any upstream I/O, so a re-registration is
//! observed atomically and an eviction is never torn.

pub mod dispatcher;
pub mod gateway;
pub mod http_server;
pub mod proxy;
pub mod registry;
pub mod sweeper;

pub use dispatcher::Dispatcher;
pub use gateway::Gateway;
pub use http_server::{router, HttpServer};
pub use proxy::Proxy;
pub use registry::{RouteTarget, ServiceRegistry, UpsertKind, RESERVED_NAMES};
pub use sweeper::{Sweeper, SweeperConfig};
