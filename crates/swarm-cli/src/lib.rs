//! # swarm-cli
//!
//! Command-line interface for swarm nodes.
//!
//! ## Commands
//!
//! - `swarm start`: run the node (bootstrap, mesh, admin surface)
//! - `swarm status`: show a running node's status
//! - `swarm networks`: list or edit the stored networks offline
//! - `swarm config`: show the effective configuration

pub mod commands;

pub use commands::Cli;
