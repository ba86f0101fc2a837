//! Gateway wiring.
//!
//! [`Gateway`] assembles the registry, log ring, proxy, and dispatcher around
//! one injected clock, and owns the sweeper's task handle so shutdown can
//! cancel it. Everything is an explicit collaborator so tests can substitute
//! the clock or sweep configuration.

use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use svchub_common::clock::Clock;
use svchub_common::logring::{LogCategory, LogLevel, LogRing};
use svchub_common::upstream::UpstreamClient;

use crate::dispatcher::Dispatcher;
use crate::proxy::Proxy;
use crate::registry::ServiceRegistry;
use crate::sweeper::{Sweeper, SweeperConfig};

pub struct Gateway {
    registry: Arc<ServiceRegistry>,
    log: Arc<LogRing>,
    dispatcher: Dispatcher,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Gateway {
    /// Builds a gateway with the default sweep thresholds and spawns the
    /// sweeper. Must be called from within a tokio runtime.
    pub fn new(clock: Arc<dyn Clock>) -> Arc<Self> {
        Self::with_config(clock, SweeperConfig::default())
    }

    pub fn with_config(clock: Arc<dyn Clock>, sweeper_config: SweeperConfig) -> Arc<Self> {
        let log = Arc::new(LogRing::new(clock.clone()));
        let registry = Arc::new(ServiceRegistry::new(clock));
        let proxy = Proxy::new(UpstreamClient::new(), log.clone());
        let dispatcher = Dispatcher::new(registry.clone(), log.clone(), proxy);

        let sweeper = Sweeper::new(registry.clone(), log.clone(), sweeper_config);
        let handle = sweeper.spawn();

        log.record(
            LogLevel::Info,
            LogCategory::Register,
            "hub starting up - service registration mode",
            None,
        );

        Arc::new(Self {
            registry,
            log,
            dispatcher,
            sweeper_handle: Mutex::new(Some(handle)),
        })
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn log(&self) -> &Arc<LogRing> {
        &self.log
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Cancels the sweeper. In-flight forwards are unaffected; they run to
    /// their natural timeout.
    pub fn shutdown(&self) {
        let handle = self
            .sweeper_handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use svchub_common::clock::ManualClock;

    #[tokio::test]
    async fn test_gateway_starts_with_startup_log_entry() {
        let gateway = Gateway::new(Arc::new(ManualClock::new()));
        let entries = gateway.log().snapshot();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].message.contains("starting up"));
        assert_eq!(gateway.registry().service_count().await, 0);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let gateway = Gateway::new(Arc::new(ManualClock::new()));
        gateway.shutdown();
        gateway.shutdown();
    }
}
