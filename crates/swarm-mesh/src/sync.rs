//! Request/response gossip that reconciles the local document with the swarm.
//!
//! One [`SyncProtocol`] lives for the whole process. Each call to
//! [`SyncProtocol::begin`] starts a bounded attempt: `SYNC_REQ` is broadcast
//! right away and again every resend interval until a strictly newer document
//! is adopted or the window closes. Inbound traffic is handled in every phase,
//! so an always-on node keeps answering requests and any node keeps merging
//! pushed documents after its own attempt has finished.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::protocol::{Signal, SyncMessage};
use crate::transport::{Inbound, MeshTransport};
use swarm_core::{Cadence, Deadline, NodeId, NodeRole, Result};
use swarm_store::{ConfigDocument, ConfigStore};

/// Where the current sync attempt stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No attempt started yet.
    Idle,
    /// Broadcasting requests and waiting for a newer document.
    Requesting,
    /// A newer document was adopted during the attempt.
    Synced,
    /// The window closed without an adoption.
    TimedOut,
}

impl SyncPhase {
    pub fn is_finished(self) -> bool {
        matches!(self, SyncPhase::Synced | SyncPhase::TimedOut)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Requesting => "requesting",
            SyncPhase::Synced => "synced",
            SyncPhase::TimedOut => "timed-out",
        }
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something the caller may need to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A strictly newer document from `from` replaced the local one.
    Adopted { version: u32, from: NodeId },
    /// A response was not newer than the local document.
    Stale { version: u32, from: NodeId },
    /// This node answered a request from `peer`.
    Answered { peer: NodeId },
    /// An attention command arrived.
    Signal(Signal),
}

#[derive(Debug)]
struct Attempt {
    deadline: Deadline,
    resend: Cadence,
}

pub struct SyncProtocol {
    role: NodeRole,
    resend_interval: Duration,
    phase: SyncPhase,
    attempt: Option<Attempt>,
}

impl SyncProtocol {
    pub fn new(role: NodeRole, resend_interval: Duration) -> Self {
        Self {
            role,
            resend_interval,
            phase: SyncPhase::Idle,
            attempt: None,
        }
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Enter `Requesting` for `window` and send the first request.
    pub fn begin(&mut self, now: Instant, window: Duration, transport: &mut dyn MeshTransport) {
        info!(
            window_secs = window.as_secs(),
            peers = transport.peers().len(),
            "requesting newer document from swarm"
        );
        self.phase = SyncPhase::Requesting;
        self.attempt = Some(Attempt {
            deadline: Deadline::after(now, window),
            resend: Cadence::immediate(now, self.resend_interval),
        });
        self.tick(now, transport);
    }

    /// Advance timers: resend while requesting, time out once the window closes.
    pub fn tick(&mut self, now: Instant, transport: &mut dyn MeshTransport) -> SyncPhase {
        if self.phase != SyncPhase::Requesting {
            return self.phase;
        }
        let Some(attempt) = self.attempt.as_mut() else {
            return self.phase;
        };
        if attempt.deadline.expired(now) {
            info!("no newer document within sync window");
            self.phase = SyncPhase::TimedOut;
            self.attempt = None;
            return self.phase;
        }
        if attempt.resend.poll(now) {
            if let Err(e) = broadcast(transport, &SyncMessage::SyncRequest) {
                warn!(error = %e, "failed to broadcast sync request");
            } else {
                debug!("broadcast SYNC_REQ");
            }
        }
        self.phase
    }

    /// Handle one inbound payload.
    ///
    /// Payloads that fail to decode are dropped without touching any state.
    pub fn handle(
        &mut self,
        inbound: &Inbound,
        store: &mut ConfigStore,
        transport: &mut dyn MeshTransport,
    ) -> Option<SyncEvent> {
        let msg = match SyncMessage::decode(&inbound.payload) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(peer = %inbound.from, error = %e, "dropping malformed mesh payload");
                return None;
            }
        };
        debug!(peer = %inbound.from, kind = msg.kind(), "mesh message received");

        match msg {
            SyncMessage::SyncRequest => {
                if !self.role.answers_sync_requests() {
                    return None;
                }
                let reply = SyncMessage::SyncResponse(store.document().clone());
                let payload = match reply.encode() {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(error = %e, "failed to encode sync response");
                        return None;
                    }
                };
                match transport.send_to(&inbound.from, payload) {
                    Ok(()) => {
                        debug!(peer = %inbound.from, version = store.current_version(), "answered sync request");
                        Some(SyncEvent::Answered {
                            peer: inbound.from.clone(),
                        })
                    }
                    Err(e) => {
                        warn!(peer = %inbound.from, error = %e, "failed to answer sync request");
                        None
                    }
                }
            }
            SyncMessage::SyncResponse(doc) => {
                let version = doc.version;
                match store.merge(doc) {
                    Ok(true) => {
                        if self.phase == SyncPhase::Requesting {
                            self.phase = SyncPhase::Synced;
                            self.attempt = None;
                        }
                        Some(SyncEvent::Adopted {
                            version,
                            from: inbound.from.clone(),
                        })
                    }
                    Ok(false) => Some(SyncEvent::Stale {
                        version,
                        from: inbound.from.clone(),
                    }),
                    Err(e) => {
                        warn!(peer = %inbound.from, version, error = %e, "failed to adopt document");
                        None
                    }
                }
            }
            SyncMessage::Signal(signal) => Some(SyncEvent::Signal(signal)),
        }
    }

    /// Drain the transport, handle everything received, then advance timers.
    pub fn poll(
        &mut self,
        now: Instant,
        store: &mut ConfigStore,
        transport: &mut dyn MeshTransport,
    ) -> Vec<SyncEvent> {
        let events = transport
            .drain()
            .iter()
            .filter_map(|inbound| self.handle(inbound, store, transport))
            .collect();
        self.tick(now, transport);
        events
    }

    /// Push a locally mutated document to every reachable peer.
    ///
    /// Call only after the document has been persisted.
    pub fn publish(doc: &ConfigDocument, transport: &mut dyn MeshTransport) -> Result<()> {
        broadcast(transport, &SyncMessage::SyncResponse(doc.clone()))?;
        info!(version = doc.version, peers = transport.peers().len(), "pushed document to swarm");
        Ok(())
    }

    /// Broadcast an attention command.
    pub fn send_signal(signal: Signal, transport: &mut dyn MeshTransport) -> Result<()> {
        broadcast(transport, &SyncMessage::Signal(signal))?;
        info!(%signal, "broadcast signal");
        Ok(())
    }
}

fn broadcast(transport: &mut dyn MeshTransport, msg: &SyncMessage) -> Result<()> {
    transport.broadcast(msg.encode()?)
}
