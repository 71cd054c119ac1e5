//! # swarm-core
//!
//! Core types and primitives shared by every crate in the swarm workspace:
//! the unified error type, node identity and role, and the monotonic timers
//! that drive the cooperative poll loop.

pub mod error;
pub mod timer;
pub mod types;

pub use error::{Result, SwarmError};
pub use timer::{Cadence, Deadline};
pub use types::*;
