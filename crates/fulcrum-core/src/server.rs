//! Server status snapshot type

use serde::{Deserialize, Serialize};

/// Snapshot of a server's state for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    /// Server identifier
    pub id: String,
    /// Health flag at snapshot time
    pub healthy: bool,
    /// Active connections at snapshot time
    pub active_connections: usize,
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}, {} active)",
            self.id,
            if self.healthy { "healthy" } else { "unhealthy" },
            self.active_connections
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let status = ServerStatus {
            id: "Server2".to_string(),
            healthy: false,
            active_connections: 3,
        };
        assert_eq!(status.to_string(), "Server2 (unhealthy, 3 active)");
    }

    #[test]
    fn test_status_serialization() {
        let status = ServerStatus {
            id: "Server1".to_string(),
            healthy: true,
            active_connections: 1,
        };
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(
            json,
            r#"{"id":"Server1","healthy":true,"active_connections":1}"#
        );
    }
}
