//! fulcrum-core: Core types for the fulcrum load balancer
//!
//! This crate provides the fundamental types shared by the balancer and its hosts:
//! - Server status snapshots
//! - Strategy selection
//! - Configuration types
//! - Error handling

pub mod config;
pub mod error;
pub mod server;

pub use config::*;
pub use error::*;
pub use server::*;
