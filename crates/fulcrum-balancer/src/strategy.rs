//! Server selection strategies

use crate::registry::ServerPool;
use crate::server::{Server, ServerHandle};
use fulcrum_core::LoadBalanceStrategy;
use std::sync::Arc;
use tracing::debug;

/// Strategy for picking a server out of the pool.
///
/// Both methods take the locked pool, so selection and any accounting it
/// does form one atomic step.
pub trait SelectionStrategy: Send + Sync + std::fmt::Debug {
    /// Which strategy this is
    fn kind(&self) -> LoadBalanceStrategy;

    /// Pick a healthy server, or `None` if there is none
    fn select(&self, pool: &mut ServerPool) -> Option<ServerHandle>;

    /// Called when a caller finishes with a server it was given
    fn on_release(&self, pool: &mut ServerPool, server: &Server);
}

/// Build the strategy for a configured kind
pub fn build(kind: LoadBalanceStrategy) -> Arc<dyn SelectionStrategy> {
    match kind {
        LoadBalanceStrategy::RoundRobin => Arc::new(RoundRobin),
        LoadBalanceStrategy::LeastConnections => Arc::new(LeastConnections),
    }
}

/// Rotates through servers in insertion order, skipping unhealthy ones.
///
/// The rotation cursor lives in the pool so that it stays valid when
/// servers are removed.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoundRobin;

impl SelectionStrategy for RoundRobin {
    fn kind(&self) -> LoadBalanceStrategy {
        LoadBalanceStrategy::RoundRobin
    }

    fn select(&self, pool: &mut ServerPool) -> Option<ServerHandle> {
        // The cursor moves on every step, healthy or not, so back-to-back
        // calls never revisit a server before the others were tried.
        for _ in 0..pool.len() {
            let server = pool.advance()?;
            if server.is_healthy() {
                debug!(
                    strategy = "round-robin",
                    server = %server.id(),
                    cursor = pool.cursor(),
                    "Selected server"
                );
                return Some(server);
            }
        }
        None
    }

    fn on_release(&self, _pool: &mut ServerPool, _server: &Server) {}
}

/// Picks the healthy server with the fewest active connections.
/// Ties go to the server registered first.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeastConnections;

impl SelectionStrategy for LeastConnections {
    fn kind(&self) -> LoadBalanceStrategy {
        LoadBalanceStrategy::LeastConnections
    }

    fn select(&self, pool: &mut ServerPool) -> Option<ServerHandle> {
        let mut best: Option<&ServerHandle> = None;
        for server in pool.servers().iter().filter(|s| s.is_healthy()) {
            match best {
                Some(b) if b.active_connections() <= server.active_connections() => {}
                _ => best = Some(server),
            }
        }

        let server = best?.clone();
        let active = server.inc_connections();
        debug!(
            strategy = "least-connections",
            server = %server.id(),
            active_connections = active,
            "Selected server"
        );
        Some(server)
    }

    fn on_release(&self, _pool: &mut ServerPool, server: &Server) {
        let active = server.dec_connections();
        debug!(server = %server.id(), active_connections = active, "Released server");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    fn registry_with(ids: &[&str]) -> Registry {
        let registry = Registry::new();
        for id in ids {
            registry.add(*id).unwrap();
        }
        registry
    }

    fn pick(strategy: &dyn SelectionStrategy, registry: &Registry) -> Option<String> {
        registry
            .with_pool(|pool| strategy.select(pool))
            .map(|s| s.id().to_string())
    }

    #[test]
    fn test_build() {
        assert_eq!(
            build(LoadBalanceStrategy::RoundRobin).kind(),
            LoadBalanceStrategy::RoundRobin
        );
        assert_eq!(
            build(LoadBalanceStrategy::LeastConnections).kind(),
            LoadBalanceStrategy::LeastConnections
        );
    }

    #[test]
    fn test_round_robin_cycles() {
        let registry = registry_with(&["A", "B", "C"]);
        let picks: Vec<_> = (0..6).filter_map(|_| pick(&RoundRobin, &registry)).collect();
        assert_eq!(picks, vec!["A", "B", "C", "A", "B", "C"]);
    }

    #[test]
    fn test_round_robin_skips_unhealthy() {
        let registry = registry_with(&["A", "B", "C"]);
        assert_eq!(pick(&RoundRobin, &registry).as_deref(), Some("A"));

        registry.set_health("B", false).unwrap();
        let picks: Vec<_> = (0..4).filter_map(|_| pick(&RoundRobin, &registry)).collect();
        assert_eq!(picks, vec!["C", "A", "C", "A"]);
    }

    #[test]
    fn test_round_robin_empty_pool() {
        let registry = Registry::new();
        assert!(pick(&RoundRobin, &registry).is_none());
        assert_eq!(registry.cursor(), 0);
    }

    #[test]
    fn test_round_robin_all_unhealthy() {
        let registry = registry_with(&["A", "B"]);
        registry.set_health("A", false).unwrap();
        registry.set_health("B", false).unwrap();
        assert!(pick(&RoundRobin, &registry).is_none());
        // A full cycle brings the cursor back to where it started
        assert_eq!(registry.cursor(), 0);
    }

    #[test]
    fn test_round_robin_does_not_count_connections() {
        let registry = registry_with(&["A"]);
        pick(&RoundRobin, &registry);
        assert_eq!(registry.statuses()[0].active_connections, 0);
    }

    #[test]
    fn test_least_connections_ties_in_insertion_order() {
        let registry = registry_with(&["S1", "S2", "S3"]);
        let picks: Vec<_> = (0..4)
            .filter_map(|_| pick(&LeastConnections, &registry))
            .collect();
        assert_eq!(picks, vec!["S1", "S2", "S3", "S1"]);

        let active: Vec<_> = registry
            .statuses()
            .iter()
            .map(|s| s.active_connections)
            .collect();
        assert_eq!(active, vec![2, 1, 1]);
    }

    #[test]
    fn test_least_connections_picks_minimum() {
        let registry = registry_with(&["S1", "S2"]);
        let servers = registry.snapshot();
        servers[0].inc_connections();
        servers[0].inc_connections();
        servers[1].inc_connections();

        assert_eq!(pick(&LeastConnections, &registry).as_deref(), Some("S2"));
        assert_eq!(servers[1].active_connections(), 2);
    }

    #[test]
    fn test_least_connections_ignores_unhealthy() {
        let registry = registry_with(&["S1", "S2"]);
        registry.set_health("S1", false).unwrap();
        assert_eq!(pick(&LeastConnections, &registry).as_deref(), Some("S2"));
        assert_eq!(pick(&LeastConnections, &registry).as_deref(), Some("S2"));

        registry.set_health("S2", false).unwrap();
        assert!(pick(&LeastConnections, &registry).is_none());
    }

    #[test]
    fn test_least_connections_release_floors_at_zero() {
        let registry = registry_with(&["S1"]);
        let server = registry
            .with_pool(|pool| LeastConnections.select(pool))
            .unwrap();
        assert_eq!(server.active_connections(), 1);

        registry.with_pool(|pool| {
            LeastConnections.on_release(pool, &server);
            LeastConnections.on_release(pool, &server);
        });
        assert_eq!(server.active_connections(), 0);
    }
}
