//! # swarm-mesh
//!
//! Replicates the network document across the swarm by flooding.
//!
//! A node that needs fresher data broadcasts `SYNC_REQ`; always-on peers
//! answer with a unicast `SYNC_RES` carrying their whole document, and the
//! highest version wins. Local edits are pushed to everyone unasked.
//!
//! The transport is a collaborator behind [`MeshTransport`]: [`MeshNode`]
//! runs it over libp2p GossipSub, [`memory::MemoryHub`] runs it in-process.

mod gossip;
pub mod memory;
pub mod node;
pub mod protocol;
pub mod sync;
pub mod transport;

pub use node::{MeshNode, MeshOptions, PeerInfo};
pub use protocol::{Signal, SyncMessage};
pub use sync::{SyncEvent, SyncPhase, SyncProtocol};
pub use transport::{Inbound, MeshTransport};
