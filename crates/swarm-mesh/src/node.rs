use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::gossip::{self, Frame, MeshEvent, SwarmCommand};
use crate::transport::{Inbound, MeshTransport};
use swarm_core::{NodeId, Result, SwarmError};

/// Known peer information tracked by the local node.
#[derive(Debug, Clone)]
pub struct PeerInfo {
    pub peer_id: NodeId,
    pub last_seen: Instant,
}

/// Settings for joining the mesh.
#[derive(Debug, Clone)]
pub struct MeshOptions {
    /// Listen multiaddr, e.g. `/ip4/0.0.0.0/tcp/5555`.
    pub listen: String,
    /// Topic shared by every node of one swarm.
    pub topic: String,
    /// Multiaddrs dialled on start.
    pub bootstrap_peers: Vec<String>,
    /// Discover peers on the LAN via mDNS.
    pub mdns: bool,
}

/// A node in the swarm mesh, backed by a libp2p GossipSub swarm.
///
/// The identity is generated at construction so the node id is stable across
/// `stop`/`start` cycles of one process.
pub struct MeshNode {
    keypair: libp2p::identity::Keypair,
    node_id: NodeId,
    options: MeshOptions,
    /// Known peers.
    peers: HashMap<NodeId, PeerInfo>,
    /// Command sender for the libp2p swarm.
    command_tx: Option<mpsc::Sender<SwarmCommand>>,
    /// Events from the swarm task.
    event_rx: Option<mpsc::Receiver<MeshEvent>>,
}

impl MeshNode {
    pub fn new(options: MeshOptions) -> Self {
        let keypair = libp2p::identity::Keypair::generate_ed25519();
        let node_id = keypair.public().to_peer_id().to_string();
        info!(node_id = %node_id, "mesh node identity created");
        Self {
            keypair,
            node_id,
            options,
            peers: HashMap::new(),
            command_tx: None,
            event_rx: None,
        }
    }

    /// Known peers with their last activity.
    pub fn peer_info(&self) -> impl Iterator<Item = &PeerInfo> {
        self.peers.values()
    }

    fn publish(&mut self, frame: Frame) -> Result<()> {
        let Some(ref cmd_tx) = self.command_tx else {
            return Err(SwarmError::Transport("mesh node not started".into()));
        };
        let data = serde_json::to_vec(&frame)?;
        match cmd_tx.try_send(SwarmCommand::Publish(data)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!("mesh command queue full, dropping outbound frame");
                Ok(())
            }
            Err(TrySendError::Closed(_)) => {
                Err(SwarmError::Transport("swarm task not running".into()))
            }
        }
    }

    fn frame(to: Option<&str>, payload: Vec<u8>) -> Result<Frame> {
        let payload = String::from_utf8(payload)
            .map_err(|_| SwarmError::Transport("mesh payloads must be UTF-8".into()))?;
        Ok(Frame {
            to: to.map(str::to_string),
            payload,
        })
    }

    fn touch(&mut self, peer_id: NodeId) {
        let now = Instant::now();
        self.peers
            .entry(peer_id.clone())
            .and_modify(|p| p.last_seen = now)
            .or_insert(PeerInfo {
                peer_id,
                last_seen: now,
            });
    }
}

impl MeshTransport for MeshNode {
    fn start(&mut self) -> Result<()> {
        if self.command_tx.is_some() {
            return Ok(());
        }
        let (event_tx, event_rx) = mpsc::channel(256);
        let handle = gossip::start_swarm(self.keypair.clone(), &self.options, event_tx)?;
        self.command_tx = Some(handle.command_tx);
        self.event_rx = Some(event_rx);
        info!(
            listen = %self.options.listen,
            topic = %self.options.topic,
            node_id = %self.node_id,
            "mesh node started"
        );
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(cmd_tx) = self.command_tx.take() {
            info!("stopping mesh node");
            let _ = cmd_tx.try_send(SwarmCommand::Shutdown);
        }
        self.event_rx = None;
        self.peers.clear();
    }

    fn is_running(&self) -> bool {
        self.command_tx.is_some()
    }

    fn node_id(&self) -> NodeId {
        self.node_id.clone()
    }

    fn peers(&self) -> Vec<NodeId> {
        let mut peers: Vec<NodeId> = self.peers.keys().cloned().collect();
        peers.sort();
        peers
    }

    fn broadcast(&mut self, payload: Vec<u8>) -> Result<()> {
        let frame = Self::frame(None, payload)?;
        self.publish(frame)?;
        debug!(peers = self.peers.len(), "broadcast mesh payload");
        Ok(())
    }

    fn send_to(&mut self, peer: &str, payload: Vec<u8>) -> Result<()> {
        if !self.peers.contains_key(peer) {
            return Err(SwarmError::PeerUnreachable(peer.to_string()));
        }
        let frame = Self::frame(Some(peer), payload)?;
        self.publish(frame)?;
        debug!(target_peer = peer, "sent mesh payload");
        Ok(())
    }

    fn drain(&mut self) -> Vec<Inbound> {
        let mut events = Vec::new();
        let mut closed = false;
        if let Some(rx) = self.event_rx.as_mut() {
            loop {
                match rx.try_recv() {
                    Ok(event) => events.push(event),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        closed = true;
                        break;
                    }
                }
            }
        }
        if closed {
            warn!("mesh swarm task exited");
            self.command_tx = None;
            self.event_rx = None;
        }

        let mut inbound = Vec::new();
        for event in events {
            match event {
                MeshEvent::PeerUp(peer) => self.touch(peer.to_string()),
                MeshEvent::PeerDown(peer) => {
                    if self.peers.remove(&peer.to_string()).is_some() {
                        info!(peer = %peer, "removed mesh peer");
                    }
                }
                MeshEvent::Frame { from, frame } => {
                    let from = from.to_string();
                    if from == self.node_id {
                        continue;
                    }
                    self.touch(from.clone());
                    // Frames addressed to someone else are ignored
                    if frame.to.as_ref().is_some_and(|to| *to != self.node_id) {
                        continue;
                    }
                    inbound.push(Inbound {
                        from,
                        payload: frame.payload.into_bytes(),
                    });
                }
            }
        }
        inbound
    }
}

impl Drop for MeshNode {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libp2p::PeerId;

    fn node() -> (MeshNode, mpsc::Sender<MeshEvent>) {
        let mut node = MeshNode::new(MeshOptions {
            listen: "/ip4/127.0.0.1/tcp/0".into(),
            topic: "test".into(),
            bootstrap_peers: Vec::new(),
            mdns: false,
        });
        let (event_tx, event_rx) = mpsc::channel(16);
        let (command_tx, _command_rx) = mpsc::channel(16);
        node.event_rx = Some(event_rx);
        node.command_tx = Some(command_tx);
        (node, event_tx)
    }

    fn peer() -> PeerId {
        libp2p::identity::Keypair::generate_ed25519()
            .public()
            .to_peer_id()
    }

    #[test]
    fn test_unicast_frame_carries_recipient() {
        let frame = MeshNode::frame(Some("peer"), b"{}".to_vec()).unwrap();
        assert_eq!(frame.to.as_deref(), Some("peer"));
        let wire = serde_json::to_string(&frame).unwrap();
        assert!(wire.contains(r#""to":"peer""#));

        let frame = MeshNode::frame(None, b"{}".to_vec()).unwrap();
        assert!(!serde_json::to_string(&frame).unwrap().contains("\"to\""));
    }

    #[test]
    fn test_drain_drops_frames_addressed_elsewhere() {
        let (mut node, event_tx) = node();
        let from = peer();
        let me = node.node_id();
        for (to, payload) in [
            (Some("someone-else".to_string()), "elsewhere"),
            (Some(me), "mine"),
            (None, "everyone"),
        ] {
            event_tx
                .try_send(MeshEvent::Frame {
                    from,
                    frame: Frame {
                        to,
                        payload: payload.into(),
                    },
                })
                .unwrap();
        }

        let payloads: Vec<Vec<u8>> = node.drain().into_iter().map(|m| m.payload).collect();
        assert_eq!(payloads, vec![b"mine".to_vec(), b"everyone".to_vec()]);
        // The sender is still recognised as a peer
        assert_eq!(node.peers(), vec![from.to_string()]);
    }

    #[test]
    fn test_non_utf8_payload_is_rejected() {
        assert!(MeshNode::frame(None, vec![0xff, 0xfe]).is_err());
    }
}
