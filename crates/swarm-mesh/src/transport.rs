use swarm_core::{NodeId, Result};

/// A payload received from the mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub from: NodeId,
    pub payload: Vec<u8>,
}

/// The mesh transport as seen by the sync protocol.
///
/// Delivery is best-effort: sends may be silently lost. The transport is
/// polled: `drain` services it and hands back whatever arrived since the
/// previous call, so received payloads are processed on the caller's task
/// with the caller's state in hand.
pub trait MeshTransport: Send {
    /// Join the mesh. Idempotent.
    fn start(&mut self) -> Result<()>;

    /// Leave the mesh and drop any queued traffic.
    fn stop(&mut self);

    fn is_running(&self) -> bool;

    fn node_id(&self) -> NodeId;

    /// Currently reachable peers.
    fn peers(&self) -> Vec<NodeId>;

    /// Send to every reachable peer.
    fn broadcast(&mut self, payload: Vec<u8>) -> Result<()>;

    /// Send to a single peer.
    ///
    /// Only the addressee processes the payload, but the transport may still
    /// put it on the air for everyone: [`MeshNode`](crate::MeshNode) publishes
    /// an addressed frame on the shared topic, so it costs as much as a
    /// broadcast and every other subscriber drops it on receipt.
    fn send_to(&mut self, peer: &str, payload: Vec<u8>) -> Result<()>;

    /// Take everything received since the last call.
    fn drain(&mut self) -> Vec<Inbound>;
}
