//! fulcrum-balancer: Server selection and health tracking
//!
//! This crate provides the in-process load-balancing core:
//! - Server registry guarded by a single lock
//! - Round-robin and least-connections strategies
//! - Periodic, cancellable health monitoring
//! - The `LoadBalancer` facade tying them together

pub mod balancer;
pub mod health;
pub mod registry;
pub mod server;
pub mod strategy;

pub use balancer::{ConnectionGuard, LoadBalancer};
pub use health::{AlwaysHealthy, HealthMonitor, HealthProbe};
pub use registry::{Registry, ServerPool};
pub use server::{Server, ServerHandle};
pub use strategy::{LeastConnections, RoundRobin, SelectionStrategy};
