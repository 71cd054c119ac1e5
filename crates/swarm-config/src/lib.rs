//! # swarm-config
//!
//! Configuration system for swarm nodes. Reads from `swarm.toml`, environment
//! variables and CLI overrides, in that precedence order.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{BootstrapStage, ConfigWarning, StationBackend, SwarmConfig, WarningSeverity};
