//! Server registry

use crate::server::{Server, ServerHandle};
use fulcrum_core::{FulcrumError, FulcrumResult, ServerStatus};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registry state guarded by the registry lock.
///
/// Strategies receive `&mut ServerPool` only from [`Registry::with_pool`], so
/// every read or write of the sequence and cursor happens under the lock.
/// It cannot be constructed outside this crate.
#[derive(Debug)]
pub struct ServerPool {
    /// Servers in insertion order
    servers: Vec<ServerHandle>,
    /// Next round-robin candidate, always in `[0, len)` (0 when empty)
    cursor: usize,
}

impl ServerPool {
    /// Servers in insertion order
    pub fn servers(&self) -> &[ServerHandle] {
        &self.servers
    }

    /// Number of registered servers
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Whether no servers are registered
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Current rotation cursor
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Return the server at the cursor and advance the cursor by one.
    /// `None` when the pool is empty.
    pub fn advance(&mut self) -> Option<ServerHandle> {
        let server = self.servers.get(self.cursor)?.clone();
        self.cursor = (self.cursor + 1) % self.servers.len();
        Some(server)
    }

    /// Whether this exact server instance is in the pool
    pub fn contains(&self, server: &ServerHandle) -> bool {
        self.servers.iter().any(|s| Arc::ptr_eq(s, server))
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.servers.iter().position(|s| s.id() == id)
    }
}

/// Registry owning the ordered list of servers.
///
/// A single lock serializes all operations, which makes them linearizable.
#[derive(Debug)]
pub struct Registry {
    pool: Mutex<ServerPool>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            pool: Mutex::new(ServerPool {
                servers: Vec::new(),
                cursor: 0,
            }),
        }
    }

    /// Run `f` with exclusive access to the pool
    pub fn with_pool<R>(&self, f: impl FnOnce(&mut ServerPool) -> R) -> R {
        let mut pool = self.pool.lock();
        f(&mut pool)
    }

    /// Register a server at the end of the rotation.
    ///
    /// Ids are unique: registering an id that is already present fails with
    /// [`FulcrumError::DuplicateServer`] and leaves the registry unchanged.
    pub fn add(&self, id: impl Into<String>) -> FulcrumResult<ServerHandle> {
        self.add_with_load(id, 0)
    }

    /// Register a server that already carries `active_connections` in-flight
    /// work units. Same duplicate policy as [`add`](Self::add).
    pub fn add_with_load(
        &self,
        id: impl Into<String>,
        active_connections: usize,
    ) -> FulcrumResult<ServerHandle> {
        let id = id.into();
        let mut pool = self.pool.lock();
        if pool.position(&id).is_some() {
            return Err(FulcrumError::DuplicateServer(id));
        }

        let server = Arc::new(Server::new(id, active_connections));
        pool.servers.push(server.clone());

        info!(
            server = %server.id(),
            active_connections,
            total_servers = pool.len(),
            "Registered server"
        );
        Ok(server)
    }

    /// Remove a server by id.
    ///
    /// The cursor keeps pointing at the same next candidate, so removal
    /// neither skips nor repeats a server in the rotation.
    pub fn remove(&self, id: &str) -> FulcrumResult<ServerHandle> {
        let mut pool = self.pool.lock();
        let index = pool
            .position(id)
            .ok_or_else(|| FulcrumError::ServerNotFound(id.to_string()))?;

        let server = pool.servers.remove(index);
        if index < pool.cursor {
            pool.cursor -= 1;
        }
        if pool.cursor >= pool.servers.len() {
            pool.cursor = 0;
        }

        info!(
            server = %id,
            total_servers = pool.len(),
            cursor = pool.cursor,
            "Unregistered server"
        );
        Ok(server)
    }

    /// Set a server's health flag
    pub fn set_health(&self, id: &str, healthy: bool) -> FulcrumResult<()> {
        let pool = self.pool.lock();
        let index = pool
            .position(id)
            .ok_or_else(|| FulcrumError::ServerNotFound(id.to_string()))?;

        update_health(&pool.servers[index], healthy);
        Ok(())
    }

    /// Set the health flag of this exact server instance.
    /// Returns `false` without changes if it is no longer registered.
    pub fn apply_health(&self, server: &ServerHandle, healthy: bool) -> bool {
        let pool = self.pool.lock();
        if !pool.contains(server) {
            return false;
        }
        update_health(server, healthy);
        true
    }

    /// Whether this exact server instance is still registered
    pub fn contains(&self, server: &ServerHandle) -> bool {
        self.pool.lock().contains(server)
    }

    /// Handles to all servers in rotation order
    pub fn snapshot(&self) -> Vec<ServerHandle> {
        self.pool.lock().servers.clone()
    }

    /// Consistent status snapshot of all servers
    pub fn statuses(&self) -> Vec<ServerStatus> {
        self.pool.lock().servers.iter().map(|s| s.status()).collect()
    }

    /// Number of registered servers
    pub fn len(&self) -> usize {
        self.pool.lock().len()
    }

    /// Whether no servers are registered
    pub fn is_empty(&self) -> bool {
        self.pool.lock().is_empty()
    }

    /// Current rotation cursor
    pub fn cursor(&self) -> usize {
        self.pool.lock().cursor
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn update_health(server: &Server, healthy: bool) {
    let was_healthy = server.set_healthy(healthy);
    match (was_healthy, healthy) {
        (true, false) => warn!(server = %server.id(), "Server marked unhealthy"),
        (false, true) => info!(server = %server.id(), "Server recovered"),
        _ => debug!(server = %server.id(), healthy, "Server health unchanged"),
    }
}
