//! Load balancer facade

use crate::health::{AlwaysHealthy, HealthMonitor, HealthProbe};
use crate::registry::Registry;
use crate::server::ServerHandle;
use crate::strategy::{self, SelectionStrategy};
use fulcrum_core::{
    BalancerConfig, FulcrumError, FulcrumResult, LoadBalanceStrategy, ServerStatus,
};
use parking_lot::Mutex;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Running health loop and its stop signal
struct HealthTask {
    shutdown: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

/// Load balancer distributing work across registered servers.
///
/// All operations are serialized by the registry lock. `choose` returning
/// `None` means no healthy server is available; callers decide whether to
/// retry or reject.
pub struct LoadBalancer {
    registry: Arc<Registry>,
    strategy: Arc<dyn SelectionStrategy>,
    probe: Arc<dyn HealthProbe>,
    health_task: Mutex<Option<HealthTask>>,
}

impl LoadBalancer {
    /// Create a new load balancer with the placeholder health probe
    pub fn new(strategy: LoadBalanceStrategy) -> Self {
        Self::with_probe(strategy, Arc::new(AlwaysHealthy))
    }

    /// Create a new load balancer using a custom health probe
    pub fn with_probe(strategy: LoadBalanceStrategy, probe: Arc<dyn HealthProbe>) -> Self {
        info!(strategy = %strategy, probe = probe.name(), "Load balancer initialized");
        Self {
            registry: Arc::new(Registry::new()),
            strategy: strategy::build(strategy),
            probe,
            health_task: Mutex::new(None),
        }
    }

    /// Create a load balancer and register the configured servers
    pub fn from_config(config: &BalancerConfig) -> FulcrumResult<Self> {
        config.validate()?;
        let lb = Self::new(config.strategy);
        for (index, id) in config.servers.iter().enumerate() {
            lb.add_server_with_load(id.as_str(), config.initial_connections_for(index))?;
        }
        Ok(lb)
    }

    /// Register a server.
    ///
    /// Duplicate ids are rejected with [`FulcrumError::DuplicateServer`].
    pub fn add_server(&self, id: impl Into<String>) -> FulcrumResult<ServerHandle> {
        self.registry.add(id)
    }

    /// Register a server that already has `active_connections` work units
    /// in flight, e.g. when taking over from another balancer.
    pub fn add_server_with_load(
        &self,
        id: impl Into<String>,
        active_connections: usize,
    ) -> FulcrumResult<ServerHandle> {
        self.registry.add_with_load(id, active_connections)
    }

    /// Unregister a server by id.
    ///
    /// Unknown ids are reported as [`FulcrumError::ServerNotFound`]. Handles
    /// already given out stay valid but are no longer selected.
    pub fn remove_server(&self, id: &str) -> FulcrumResult<()> {
        self.registry.remove(id).map(|_| ())
    }

    /// Pick a server for the next unit of work
    pub fn choose(&self) -> Option<ServerHandle> {
        let chosen = self.registry.with_pool(|pool| self.strategy.select(pool));
        if chosen.is_none() {
            debug!(strategy = %self.strategy.kind(), "No healthy server available");
        }
        chosen
    }

    /// Pick a server and release it automatically when the guard drops
    pub fn choose_guarded(&self) -> Option<ConnectionGuard<'_>> {
        self.choose().map(|server| ConnectionGuard {
            balancer: self,
            server,
        })
    }

    /// Return a server obtained from [`choose`](Self::choose).
    ///
    /// Safe to call with any strategy; for round-robin it only checks that
    /// the server is still registered. Releasing a removed server fails with
    /// [`FulcrumError::ServerNotFound`] and changes nothing.
    pub fn release(&self, server: &ServerHandle) -> FulcrumResult<()> {
        self.registry.with_pool(|pool| {
            if !pool.contains(server) {
                return Err(FulcrumError::ServerNotFound(server.id().to_string()));
            }
            self.strategy.on_release(pool, server);
            Ok(())
        })
    }

    /// Override a server's health flag
    pub fn set_health(&self, id: &str, healthy: bool) -> FulcrumResult<()> {
        self.registry.set_health(id, healthy)
    }

    /// Handles to all registered servers in rotation order
    pub fn servers(&self) -> Vec<ServerHandle> {
        self.registry.snapshot()
    }

    /// Status snapshot of all registered servers
    pub fn statuses(&self) -> Vec<ServerStatus> {
        self.registry.statuses()
    }

    /// Get the current strategy
    pub fn strategy(&self) -> LoadBalanceStrategy {
        self.strategy.kind()
    }

    /// Start the periodic health loop on the current tokio runtime.
    ///
    /// Must be called from within a runtime.
    pub fn start_health_loop(&self, interval: Duration) -> FulcrumResult<()> {
        if interval.is_zero() {
            return Err(FulcrumError::Config(
                "Health check interval must be non-zero".to_string(),
            ));
        }

        let mut task = self.health_task.lock();
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return Err(FulcrumError::HealthLoopRunning);
        }

        let (shutdown, rx) = broadcast::channel(1);
        let monitor = HealthMonitor::new(self.registry.clone(), self.probe.clone(), interval);
        let handle = tokio::spawn(monitor.run(rx));

        *task = Some(HealthTask { shutdown, handle });
        Ok(())
    }

    /// Stop the health loop and wait for it to exit.
    ///
    /// Returns `false` if no loop was running.
    pub async fn stop_health_loop(&self) -> bool {
        let task = self.health_task.lock().take();
        let Some(task) = task else {
            return false;
        };

        let _ = task.shutdown.send(());
        if let Err(e) = task.handle.await {
            warn!(error = %e, "Health loop task failed");
        }
        true
    }

    /// Whether the health loop is running
    pub fn health_loop_running(&self) -> bool {
        self.health_task
            .lock()
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }
}

impl Default for LoadBalancer {
    fn default() -> Self {
        Self::new(LoadBalanceStrategy::RoundRobin)
    }
}

impl Drop for LoadBalancer {
    fn drop(&mut self) {
        if let Some(task) = self.health_task.get_mut().take() {
            let _ = task.shutdown.send(());
        }
    }
}

impl std::fmt::Debug for LoadBalancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadBalancer")
            .field("strategy", &self.strategy.kind())
            .field("servers", &self.registry.len())
            .field("probe", &self.probe.name())
            .finish()
    }
}

/// A chosen server that is released when dropped
pub struct ConnectionGuard<'a> {
    balancer: &'a LoadBalancer,
    server: ServerHandle,
}

impl ConnectionGuard<'_> {
    /// Handle to the chosen server
    pub fn server(&self) -> &ServerHandle {
        &self.server
    }
}

impl Deref for ConnectionGuard<'_> {
    type Target = ServerHandle;

    fn deref(&self) -> &Self::Target {
        &self.server
    }
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.balancer.release(&self.server) {
            debug!(server = %self.server.id(), error = %e, "Guard release skipped");
        }
    }
}
