//! In-process mesh for tests and local simulation.
//!
//! A shared [`MemoryHub`] routes payloads between the [`MemoryTransport`]s
//! created from it. Every send is also recorded so tests can assert on
//! exactly what a node put on the air.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

use crate::transport::{Inbound, MeshTransport};
use swarm_core::{NodeId, Result, SwarmError};

/// One payload a node put on the mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub from: NodeId,
    /// `None` for broadcasts.
    pub to: Option<NodeId>,
    pub payload: Vec<u8>,
}

#[derive(Default)]
struct Slot {
    running: bool,
    inbox: VecDeque<Inbound>,
}

#[derive(Default)]
struct HubState {
    nodes: HashMap<NodeId, Slot>,
    sent: Vec<Sent>,
    lossy: bool,
}

/// Shared broker connecting in-memory transports.
#[derive(Clone, Default)]
pub struct MemoryHub {
    state: Arc<Mutex<HubState>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or re-attach) the transport for `id`. It starts stopped.
    pub fn transport(&self, id: impl Into<NodeId>) -> MemoryTransport {
        let id = id.into();
        self.state.lock().nodes.entry(id.clone()).or_default();
        MemoryTransport {
            id,
            hub: self.clone(),
        }
    }

    /// Deliver `payload` to `to` as if `from` had sent it, without recording it.
    pub fn inject(&self, to: &str, from: &str, payload: Vec<u8>) {
        let mut state = self.state.lock();
        if let Some(slot) = state.nodes.get_mut(to) {
            slot.inbox.push_back(Inbound {
                from: from.to_string(),
                payload,
            });
        }
    }

    /// Drop every payload sent from now on (sends still succeed and are recorded).
    pub fn set_lossy(&self, lossy: bool) {
        self.state.lock().lossy = lossy;
    }

    /// Everything sent so far, in order.
    pub fn sent(&self) -> Vec<Sent> {
        self.state.lock().sent.clone()
    }

    /// Sends originating from `node`.
    pub fn sent_by(&self, node: &str) -> Vec<Sent> {
        self.state
            .lock()
            .sent
            .iter()
            .filter(|s| s.from == node)
            .cloned()
            .collect()
    }

    pub fn clear_sent(&self) {
        self.state.lock().sent.clear();
    }
}

/// One node's view of a [`MemoryHub`].
pub struct MemoryTransport {
    id: NodeId,
    hub: MemoryHub,
}

impl MeshTransport for MemoryTransport {
    fn start(&mut self) -> Result<()> {
        let mut state = self.hub.state.lock();
        state.nodes.entry(self.id.clone()).or_default().running = true;
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.hub.state.lock();
        if let Some(slot) = state.nodes.get_mut(&self.id) {
            slot.running = false;
            slot.inbox.clear();
        }
    }

    fn is_running(&self) -> bool {
        self.hub
            .state
            .lock()
            .nodes
            .get(&self.id)
            .is_some_and(|s| s.running)
    }

    fn node_id(&self) -> NodeId {
        self.id.clone()
    }

    fn peers(&self) -> Vec<NodeId> {
        let state = self.hub.state.lock();
        let mut peers: Vec<NodeId> = state
            .nodes
            .iter()
            .filter(|(id, slot)| **id != self.id && slot.running)
            .map(|(id, _)| id.clone())
            .collect();
        peers.sort();
        peers
    }

    fn broadcast(&mut self, payload: Vec<u8>) -> Result<()> {
        let mut state = self.hub.state.lock();
        if !state.nodes.get(&self.id).is_some_and(|s| s.running) {
            return Err(SwarmError::Transport("mesh not started".into()));
        }
        state.sent.push(Sent {
            from: self.id.clone(),
            to: None,
            payload: payload.clone(),
        });
        if state.lossy {
            return Ok(());
        }
        let mut delivered = 0usize;
        for (id, slot) in state.nodes.iter_mut() {
            if *id == self.id || !slot.running {
                continue;
            }
            slot.inbox.push_back(Inbound {
                from: self.id.clone(),
                payload: payload.clone(),
            });
            delivered += 1;
        }
        debug!(from = %self.id, delivered, "memory broadcast");
        Ok(())
    }

    fn send_to(&mut self, peer: &str, payload: Vec<u8>) -> Result<()> {
        let mut state = self.hub.state.lock();
        if !state.nodes.get(&self.id).is_some_and(|s| s.running) {
            return Err(SwarmError::Transport("mesh not started".into()));
        }
        if !state.nodes.get(peer).is_some_and(|s| s.running) {
            return Err(SwarmError::PeerUnreachable(peer.to_string()));
        }
        state.sent.push(Sent {
            from: self.id.clone(),
            to: Some(peer.to_string()),
            payload: payload.clone(),
        });
        if state.lossy {
            return Ok(());
        }
        if let Some(slot) = state.nodes.get_mut(peer) {
            slot.inbox.push_back(Inbound {
                from: self.id.clone(),
                payload,
            });
        }
        Ok(())
    }

    fn drain(&mut self) -> Vec<Inbound> {
        let mut state = self.hub.state.lock();
        match state.nodes.get_mut(&self.id) {
            Some(slot) if slot.running => slot.inbox.drain(..).collect(),
            _ => Vec::new(),
        }
    }
}
