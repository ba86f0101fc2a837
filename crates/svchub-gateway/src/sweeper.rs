//! Heartbeat sweeper.
//!
//! A single background task that periodically marks quiet services stale and
//! evicts dead ones. Liveness is defined solely by incoming registrations;
//! the sweeper never probes upstreams. The thresholds tolerate three missed
//! five-minute heartbeats before a service goes stale.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use svchub_common::logring::{LogCategory, LogContext, LogLevel, LogRing};

use crate::registry::ServiceRegistry;

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Interval between sweeps.
    pub tick: Duration,
    /// Heartbeat age after which a service is marked `STALE`.
    pub stale_after: Duration,
    /// Heartbeat age after which a service is removed entirely.
    pub evict_after: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(60),
            stale_after: Duration::from_secs(15 * 60),
            evict_after: Duration::from_secs(60 * 60),
        }
    }
}

pub struct Sweeper {
    registry: Arc<ServiceRegistry>,
    log: Arc<LogRing>,
    config: SweeperConfig,
}

impl Sweeper {
    pub fn new(registry: Arc<ServiceRegistry>, log: Arc<LogRing>, config: SweeperConfig) -> Self {
        Self {
            registry,
            log,
            config,
        }
    }

    /// Starts the sweep loop. The returned handle is aborted at shutdown;
    /// a sweep in progress finishes its registry call before the task dies.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        let mut interval = tokio::time::interval(self.config.tick);
        // the first tick fires immediately; harmless against an empty registry
        loop {
            interval.tick().await;
            self.sweep_once().await;
        }
    }

    /// One mark-then-evict pass. Public so tests can drive it with a manual
    /// clock instead of waiting out the tick interval.
    pub async fn sweep_once(&self) {
        for name in self
            .registry
            .mark_stale_older_than(self.config.stale_after)
            .await
        {
            self.log.record(
                LogLevel::Warning,
                LogCategory::Sweep,
                format!(
                    "Service '{name}' marked stale: no heartbeat in {}s",
                    self.config.stale_after.as_secs()
                ),
                Some(LogContext {
                    service: Some(name),
                    ..Default::default()
                }),
            );
        }

        for name in self
            .registry
            .evict_older_than(self.config.evict_after)
            .await
        {
            self.log.record(
                LogLevel::Warning,
                LogCategory::Sweep,
                format!(
                    "Service '{name}' evicted: no heartbeat in {}s",
                    self.config.evict_after.as_secs()
                ),
                Some(LogContext {
                    service: Some(name),
                    ..Default::default()
                }),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use svchub_common::clock::ManualClock;
    use svchub_common::manifest::{HttpMethod, RegistrationRequest, ServiceStatus};

    fn setup() -> (Sweeper, Arc<ServiceRegistry>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let registry = Arc::new(ServiceRegistry::new(clock.clone()));
        let log = Arc::new(LogRing::new(clock.clone()));
        let sweeper = Sweeper::new(registry.clone(), log, SweeperConfig::default());
        (sweeper, registry, clock)
    }

    async fn register(registry: &ServiceRegistry, name: &str) {
        let request: RegistrationRequest = serde_json::from_value(json!({
            "name": name,
            "internal_url": "http://svc.local:9000",
            "endpoints": [{"path": "/op"}]
        }))
        .unwrap();
        registry.upsert(&request).await.unwrap();
    }

    #[tokio::test]
    async fn test_sweep_marks_stale_then_evicts() {
        let (sweeper, registry, clock) = setup();
        register(&registry, "s").await;

        // t = 16 min: stale, still resolvable
        clock.advance(Duration::from_secs(16 * 60));
        sweeper.sweep_once().await;
        let snap = registry.snapshot().await;
        assert_eq!(snap[0].status, ServiceStatus::Stale);
        assert!(registry.lookup("s", HttpMethod::Post, "/op").await.is_some());

        // t = 61 min: evicted, routes gone
        clock.advance(Duration::from_secs(45 * 60));
        sweeper.sweep_once().await;
        assert_eq!(registry.service_count().await, 0);
        assert!(registry.lookup("s", HttpMethod::Post, "/op").await.is_none());
    }

    #[tokio::test]
    async fn test_sweep_leaves_fresh_services_alone() {
        let (sweeper, registry, clock) = setup();
        register(&registry, "fresh").await;
        clock.advance(Duration::from_secs(5 * 60));
        sweeper.sweep_once().await;

        let snap = registry.snapshot().await;
        assert_eq!(snap[0].status, ServiceStatus::Active);
        assert_eq!(registry.service_count().await, 1);
    }

    #[tokio::test]
    async fn test_sweep_logs_transitions() {
        let clock = Arc::new(ManualClock::new());
        let registry = Arc::new(ServiceRegistry::new(clock.clone()));
        let log = Arc::new(LogRing::new(clock.clone()));
        let sweeper = Sweeper::new(registry.clone(), log.clone(), SweeperConfig::default());

        register(&registry, "quiet").await;
        clock.advance(Duration::from_secs(20 * 60));
        sweeper.sweep_once().await;

        let entries = log.snapshot();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].category, LogCategory::Sweep);
        assert!(entries[0].message.contains("marked stale"));
    }

    #[tokio::test]
    async fn test_heartbeat_resets_sweep_clock() {
        let (sweeper, registry, clock) = setup();
        register(&registry, "s").await;

        clock.advance(Duration::from_secs(14 * 60));
        register(&registry, "s").await; // heartbeat
        clock.advance(Duration::from_secs(14 * 60));
        sweeper.sweep_once().await;

        assert_eq!(registry.snapshot().await[0].status, ServiceStatus::Active);
    }
}
