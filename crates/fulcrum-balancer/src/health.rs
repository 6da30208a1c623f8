//! Health checking for servers

use crate::registry::Registry;
use crate::server::Server;
use async_trait::async_trait;
use fulcrum_core::FulcrumResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Liveness check for a single server.
///
/// Probes run outside the registry lock and may block or fail freely; a
/// failure only marks the probed server unhealthy.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Check one server, returning whether it is healthy
    async fn probe(&self, server: &Server) -> FulcrumResult<bool>;

    /// Probe name for logging
    fn name(&self) -> &'static str;
}

/// Probe that reports every server as healthy
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysHealthy;

#[async_trait]
impl HealthProbe for AlwaysHealthy {
    async fn probe(&self, _server: &Server) -> FulcrumResult<bool> {
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "always-healthy"
    }
}

/// Periodically probes all registered servers and updates their health flags.
///
/// Only health flags are touched; connection counts and membership are not.
pub struct HealthMonitor {
    registry: Arc<Registry>,
    probe: Arc<dyn HealthProbe>,
    interval: Duration,
}

impl HealthMonitor {
    /// Create a new health monitor
    pub fn new(registry: Arc<Registry>, probe: Arc<dyn HealthProbe>, interval: Duration) -> Self {
        Self {
            registry,
            probe,
            interval,
        }
    }

    /// Get the check interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run the loop until a shutdown signal arrives or the sender is dropped.
    ///
    /// The first check happens one full interval after start.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            probe = self.probe.name(),
            "Health monitor starting"
        );

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every server once and apply the results
    pub async fn check_all(&self) {
        let servers = self.registry.snapshot();

        for server in servers {
            let healthy = match self.probe.probe(&server).await {
                Ok(true) => true,
                Ok(false) => {
                    warn!(server = %server.id(), "Health check failed");
                    false
                }
                Err(e) => {
                    warn!(server = %server.id(), error = %e, "Health check error");
                    false
                }
            };

            if !self.registry.apply_health(&server, healthy) {
                debug!(server = %server.id(), "Server removed during health check");
            }
        }
    }
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("probe", &self.probe.name())
            .field("interval", &self.interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fulcrum_core::{FulcrumError, DEFAULT_HEALTH_CHECK_INTERVAL_SECS};

    fn default_interval() -> Duration {
        Duration::from_secs(DEFAULT_HEALTH_CHECK_INTERVAL_SECS)
    }

    /// Fails for one server id, reports the rest healthy
    struct FailingProbe(&'static str);

    #[async_trait]
    impl HealthProbe for FailingProbe {
        async fn probe(&self, server: &Server) -> FulcrumResult<bool> {
            if server.id() == self.0 {
                Err(FulcrumError::Probe("connection refused".to_string()))
            } else {
                Ok(true)
            }
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn registry_with(ids: &[&str]) -> Arc<Registry> {
        let registry = Arc::new(Registry::new());
        for id in ids {
            registry.add(*id).unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn test_always_healthy_restores_servers() {
        let registry = registry_with(&["A", "B"]);
        registry.set_health("B", false).unwrap();
        let server = registry.snapshot()[1].clone();
        assert!(!server.is_healthy());

        let monitor =
            HealthMonitor::new(registry.clone(), Arc::new(AlwaysHealthy), default_interval());
        monitor.check_all().await;

        assert!(server.is_healthy());
        assert!(registry.statuses().iter().all(|s| s.healthy));
    }

    #[tokio::test]
    async fn test_probe_error_only_downgrades_that_server() {
        let registry = registry_with(&["A", "B", "C"]);
        registry.snapshot()[0].inc_connections();

        let monitor = HealthMonitor::new(
            registry.clone(),
            Arc::new(FailingProbe("B")),
            default_interval(),
        );
        monitor.check_all().await;

        let statuses = registry.statuses();
        assert!(statuses[0].healthy);
        assert!(!statuses[1].healthy);
        assert!(statuses[2].healthy);
        assert_eq!(statuses[0].active_connections, 1);
        assert_eq!(statuses.len(), 3);
    }

    #[tokio::test]
    async fn test_run_applies_checks_and_stops() {
        let registry = registry_with(&["A"]);
        registry.set_health("A", false).unwrap();

        let monitor = HealthMonitor::new(
            registry.clone(),
            Arc::new(AlwaysHealthy),
            Duration::from_millis(10),
        );
        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(monitor.run(rx));

        time::sleep(Duration::from_millis(100)).await;
        assert!(registry.statuses()[0].healthy);

        tx.send(()).unwrap();
        time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("health loop did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_stops_when_sender_dropped() {
        let registry = registry_with(&["A"]);
        let monitor =
            HealthMonitor::new(registry, Arc::new(AlwaysHealthy), Duration::from_secs(60));
        let (tx, rx) = broadcast::channel::<()>(1);
        assert_eq!(monitor.interval(), Duration::from_secs(60));
        let handle = tokio::spawn(monitor.run(rx));

        drop(tx);
        time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("health loop did not stop")
            .unwrap();
    }
}
