//! libp2p swarm backing [`MeshNode`](crate::MeshNode).
//!
//! TCP transport with Noise encryption and Yamux multiplexing, GossipSub on a
//! single topic per swarm, optional mDNS discovery, and Identify. Unicast is
//! layered on the topic: a frame may name a recipient, and every other node
//! drops it on receipt.

use std::time::Duration;

use futures::StreamExt;
use libp2p::{
    Multiaddr, PeerId, Swarm, gossipsub, identify, identity, mdns, noise,
    swarm::{NetworkBehaviour, SwarmEvent, behaviour::toggle::Toggle},
    tcp, yamux,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::node::MeshOptions;
use swarm_core::{Result, SwarmError};

/// Commands sent from the MeshNode API to the background swarm event loop.
#[derive(Debug)]
pub(crate) enum SwarmCommand {
    /// Publish a serialized frame to the swarm topic.
    Publish(Vec<u8>),
    /// Shut down the swarm.
    Shutdown,
}

/// Events forwarded from the swarm loop to the MeshNode.
#[derive(Debug)]
pub(crate) enum MeshEvent {
    Frame { from: PeerId, frame: Frame },
    PeerUp(PeerId),
    PeerDown(PeerId),
}

impl MeshEvent {
    fn kind(&self) -> &'static str {
        match self {
            MeshEvent::Frame { .. } => "frame",
            MeshEvent::PeerUp(_) => "peer_up",
            MeshEvent::PeerDown(_) => "peer_down",
        }
    }
}

/// Envelope published on the topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Frame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    pub payload: String,
}

#[derive(NetworkBehaviour)]
pub(crate) struct SwarmBehaviour {
    gossipsub: gossipsub::Behaviour,
    mdns: Toggle<mdns::tokio::Behaviour>,
    identify: identify::Behaviour,
}

/// Handle returned after starting the swarm.
pub(crate) struct SwarmHandle {
    pub command_tx: mpsc::Sender<SwarmCommand>,
}

/// Build the swarm, listen, dial bootstrap peers, and spawn the event loop.
///
/// Must be called from within a tokio runtime.
pub(crate) fn start_swarm(
    keypair: identity::Keypair,
    options: &MeshOptions,
    event_tx: mpsc::Sender<MeshEvent>,
) -> Result<SwarmHandle> {
    let mut swarm = build_swarm(keypair, options.mdns)
        .map_err(|e| SwarmError::Transport(format!("failed to build libp2p swarm: {e}")))?;

    let addr: Multiaddr = options.listen.parse().map_err(|e| {
        SwarmError::Transport(format!("invalid mesh listen address '{}': {e}", options.listen))
    })?;
    swarm
        .listen_on(addr)
        .map_err(|e| SwarmError::Transport(format!("failed to listen: {e}")))?;

    for peer_addr in &options.bootstrap_peers {
        match peer_addr.parse::<Multiaddr>() {
            Ok(addr) => {
                info!(addr = %addr, "dialing bootstrap peer");
                if let Err(e) = swarm.dial(addr) {
                    warn!(error = %e, "failed to dial bootstrap peer");
                }
            }
            Err(e) => {
                warn!(addr = %peer_addr, error = %e, "invalid bootstrap peer address, skipping");
            }
        }
    }

    let topic = gossipsub::IdentTopic::new(options.topic.clone());
    swarm
        .behaviour_mut()
        .gossipsub
        .subscribe(&topic)
        .map_err(|e| SwarmError::Transport(format!("failed to subscribe to topic: {e}")))?;

    let (command_tx, command_rx) = mpsc::channel(256);
    tokio::spawn(run_swarm_loop(swarm, topic, event_tx, command_rx));

    Ok(SwarmHandle { command_tx })
}

fn build_swarm(
    keypair: identity::Keypair,
    enable_mdns: bool,
) -> std::result::Result<Swarm<SwarmBehaviour>, Box<dyn std::error::Error + Send + Sync>> {
    let swarm = libp2p::SwarmBuilder::with_existing_identity(keypair)
        .with_tokio()
        .with_tcp(
            tcp::Config::default(),
            noise::Config::new,
            yamux::Config::default,
        )?
        .with_behaviour(|key| {
            // Default message ids (source + sequence number): periodic SYNC_REQs
            // carry identical bytes and must not be suppressed as duplicates.
            let gossipsub_config = gossipsub::ConfigBuilder::default()
                .heartbeat_interval(Duration::from_secs(1))
                .validation_mode(gossipsub::ValidationMode::Strict)
                .max_transmit_size(64 * 1024)
                .build()
                .map_err(|e| std::io::Error::other(e.to_string()))?;

            let gossipsub = gossipsub::Behaviour::new(
                gossipsub::MessageAuthenticity::Signed(key.clone()),
                gossipsub_config,
            )
            .map_err(|e| std::io::Error::other(e.to_string()))?;

            let mdns = if enable_mdns {
                Some(mdns::tokio::Behaviour::new(
                    mdns::Config::default(),
                    key.public().to_peer_id(),
                )?)
            } else {
                None
            };

            let identify = identify::Behaviour::new(
                identify::Config::new("/swarm/mesh/1.0.0".to_string(), key.public())
                    .with_agent_version(format!("swarm/{}", env!("CARGO_PKG_VERSION"))),
            );

            Ok(SwarmBehaviour {
                gossipsub,
                mdns: Toggle::from(mdns),
                identify,
            })
        })?
        .build();

    Ok(swarm)
}

async fn run_swarm_loop(
    mut swarm: Swarm<SwarmBehaviour>,
    topic: gossipsub::IdentTopic,
    event_tx: mpsc::Sender<MeshEvent>,
    mut command_rx: mpsc::Receiver<SwarmCommand>,
) {
    loop {
        tokio::select! {
            event = swarm.select_next_some() => {
                if !handle_swarm_event(&mut swarm, &event_tx, event) {
                    break;
                }
            }
            cmd = command_rx.recv() => {
                match cmd {
                    Some(SwarmCommand::Publish(data)) => {
                        if let Err(e) = swarm.behaviour_mut().gossipsub.publish(topic.clone(), data) {
                            // InsufficientPeers is normal when the node is alone
                            debug!(error = %e, "gossipsub publish failed");
                        }
                    }
                    Some(SwarmCommand::Shutdown) | None => {
                        info!("mesh swarm shutting down");
                        break;
                    }
                }
            }
        }
    }
}

/// Hand an event to the MeshNode without waiting on it.
///
/// The node only drains between ticks, and may be busy elsewhere for a long
/// time, so a full queue drops the event. Returns `false` once the receiver
/// is gone.
fn forward(event_tx: &mpsc::Sender<MeshEvent>, event: MeshEvent) -> bool {
    match event_tx.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(event)) => {
            warn!(event = event.kind(), "mesh event queue full, dropping event");
            true
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

/// Handle one swarm event. Returns `false` once the MeshNode side is gone.
fn handle_swarm_event(
    swarm: &mut Swarm<SwarmBehaviour>,
    event_tx: &mpsc::Sender<MeshEvent>,
    event: SwarmEvent<SwarmBehaviourEvent>,
) -> bool {
    match event {
        SwarmEvent::Behaviour(SwarmBehaviourEvent::Mdns(mdns::Event::Discovered(list))) => {
            for (peer_id, addr) in list {
                info!(peer = %peer_id, addr = %addr, "mDNS discovered peer");
                swarm.behaviour_mut().gossipsub.add_explicit_peer(&peer_id);
                if let Err(e) = swarm.dial(addr) {
                    debug!(peer = %peer_id, error = %e, "dial after mDNS discovery failed (may already be connected)");
                }
            }
        }
        SwarmEvent::Behaviour(SwarmBehaviourEvent::Mdns(mdns::Event::Expired(list))) => {
            for (peer_id, _addr) in list {
                info!(peer = %peer_id, "mDNS peer expired");
                swarm.behaviour_mut().gossipsub.remove_explicit_peer(&peer_id);
            }
        }
        SwarmEvent::Behaviour(SwarmBehaviourEvent::Gossipsub(gossipsub::Event::Message {
            message,
            ..
        })) => {
            let Some(from) = message.source else {
                debug!("dropping unsigned gossipsub message");
                return true;
            };
            match serde_json::from_slice::<Frame>(&message.data) {
                Ok(frame) => {
                    if !forward(event_tx, MeshEvent::Frame { from, frame }) {
                        warn!("mesh event receiver dropped, stopping");
                        return false;
                    }
                }
                Err(e) => {
                    debug!(peer = %from, error = %e, "dropping malformed mesh frame");
                }
            }
        }
        SwarmEvent::Behaviour(SwarmBehaviourEvent::Identify(identify::Event::Received {
            peer_id,
            info,
            ..
        })) => {
            debug!(peer = %peer_id, agent = %info.agent_version, "identified peer");
        }
        SwarmEvent::NewListenAddr { address, .. } => {
            info!(addr = %address, "mesh node listening");
        }
        SwarmEvent::ConnectionEstablished {
            peer_id,
            num_established,
            ..
        } => {
            if num_established.get() == 1 {
                info!(peer = %peer_id, "mesh connection established");
                if !forward(event_tx, MeshEvent::PeerUp(peer_id)) {
                    return false;
                }
            }
        }
        SwarmEvent::ConnectionClosed {
            peer_id,
            num_established,
            cause,
            ..
        } => {
            if num_established == 0 {
                info!(peer = %peer_id, cause = ?cause, "mesh connection closed");
                if !forward(event_tx, MeshEvent::PeerDown(peer_id)) {
                    return false;
                }
            }
        }
        SwarmEvent::OutgoingConnectionError { peer_id, error, .. } => {
            warn!(peer = ?peer_id, error = %error, "outgoing connection error");
        }
        _ => {}
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> PeerId {
        identity::Keypair::generate_ed25519().public().to_peer_id()
    }

    fn frame(payload: &str) -> MeshEvent {
        MeshEvent::Frame {
            from: peer(),
            frame: Frame {
                to: None,
                payload: payload.into(),
            },
        }
    }

    #[test]
    fn test_full_queue_drops_event_and_keeps_running() {
        let (tx, mut rx) = mpsc::channel(1);
        assert!(forward(&tx, frame("first")));
        assert!(forward(&tx, frame("second")));

        match rx.try_recv() {
            Ok(MeshEvent::Frame { frame, .. }) => assert_eq!(frame.payload, "first"),
            other => panic!("expected the first frame, got {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_queue_stops_forwarding() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        assert!(!forward(&tx, MeshEvent::PeerUp(peer())));
    }

    #[test]
    fn test_addressed_frame_names_recipient_on_the_wire() {
        let addressed = Frame {
            to: Some("peer".into()),
            payload: "{}".into(),
        };
        let json: serde_json::Value =
            serde_json::from_slice(&serde_json::to_vec(&addressed).unwrap()).unwrap();
        assert_eq!(json["to"], "peer");

        let broadcast = Frame {
            to: None,
            payload: "{}".into(),
        };
        let json: serde_json::Value =
            serde_json::from_slice(&serde_json::to_vec(&broadcast).unwrap()).unwrap();
        assert!(json.get("to").is_none());
    }
}
