//! Server record

use fulcrum_core::ServerStatus;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared handle to a registered server.
///
/// The registry and every caller hold the same allocation, so health and
/// connection changes are visible to all holders.
pub type ServerHandle = Arc<Server>;

/// A backend server tracked by the balancer.
///
/// Holders can read the state without locking. Writers are crate-private and
/// only called by the registry and strategies while the registry lock is held.
///
/// Code outside the crate cannot change the counters directly:
///
/// ```compile_fail
/// use fulcrum_balancer::LoadBalancer;
///
/// let lb = LoadBalancer::default();
/// let server = lb.add_server("Server1").unwrap();
/// server.inc_connections();
/// ```
#[derive(Debug)]
pub struct Server {
    id: String,
    healthy: AtomicBool,
    active_connections: AtomicUsize,
}

impl Server {
    /// Create a healthy server with `active_connections` in-flight work units
    pub(crate) fn new(id: String, active_connections: usize) -> Self {
        Self {
            id,
            healthy: AtomicBool::new(true),
            active_connections: AtomicUsize::new(active_connections),
        }
    }

    /// Unique identifier of the server
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the server is eligible for selection
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    /// Number of in-flight work units assigned to this server
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Acquire)
    }

    /// Point-in-time copy of the server state
    pub fn status(&self) -> ServerStatus {
        ServerStatus {
            id: self.id.clone(),
            healthy: self.is_healthy(),
            active_connections: self.active_connections(),
        }
    }

    /// Set the health flag, returning the previous value
    pub(crate) fn set_healthy(&self, healthy: bool) -> bool {
        self.healthy.swap(healthy, Ordering::AcqRel)
    }

    /// Increment the active connection count, returning the new value
    pub(crate) fn inc_connections(&self) -> usize {
        self.active_connections.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrement the active connection count, saturating at zero.
    /// Returns the new value.
    pub(crate) fn dec_connections(&self) -> usize {
        match self
            .active_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(prev) => prev - 1,
            Err(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_server_defaults() {
        let server = Server::new("Server1".to_string(), 0);
        assert_eq!(server.id(), "Server1");
        assert!(server.is_healthy());
        assert_eq!(server.active_connections(), 0);
    }

    #[test]
    fn test_initial_connections() {
        let server = Server::new("Server1".to_string(), 4);
        assert_eq!(server.active_connections(), 4);
        assert_eq!(server.dec_connections(), 3);
    }

    #[test]
    fn test_connection_count_saturates_at_zero() {
        let server = Server::new("Server1".to_string(), 0);
        assert_eq!(server.inc_connections(), 1);
        assert_eq!(server.dec_connections(), 0);
        assert_eq!(server.dec_connections(), 0);
        assert_eq!(server.active_connections(), 0);
    }

    #[test]
    fn test_set_healthy_returns_previous() {
        let server = Server::new("Server1".to_string(), 0);
        assert!(server.set_healthy(false));
        assert!(!server.set_healthy(true));
        assert!(server.is_healthy());
    }

    #[test]
    fn test_status_snapshot() {
        let server = Server::new("Server1".to_string(), 0);
        server.inc_connections();
        let status = server.status();
        assert_eq!(status.id, "Server1");
        assert!(status.healthy);
        assert_eq!(status.active_connections, 1);
    }
}
