//! The startup fallback chain: known networks, then the mesh, then an operator.
//!
//! Each stage is bounded, so the whole chain is too. Failing every stage is
//! not an error; the node carries on offline and the runtime's reconnect
//! timer keeps retrying known networks.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::device::DeviceControl;
use crate::portal::{PortalOutcome, ProvisioningPortal};
use crate::station::{ConnectOutcome, Station};
use swarm_config::{BootstrapStage, SwarmConfig};
use swarm_core::NodeRole;
use swarm_mesh::{MeshTransport, SyncEvent, SyncPhase, SyncProtocol};
use swarm_store::ConfigStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Connected { ssid: String, stage: BootstrapStage },
    Offline,
}

impl BootstrapOutcome {
    pub fn is_connected(&self) -> bool {
        matches!(self, BootstrapOutcome::Connected { .. })
    }
}

/// Everything the chain needs, borrowed from the runtime for one run.
pub struct BootstrapContext<'a> {
    pub store: &'a mut ConfigStore,
    pub sync: &'a mut SyncProtocol,
    pub mesh: &'a mut dyn MeshTransport,
    pub station: &'a mut Station,
    pub portal: &'a mut dyn ProvisioningPortal,
    pub device: &'a mut dyn DeviceControl,
}

#[derive(Debug, Clone)]
pub struct BootstrapPolicy {
    pub role: NodeRole,
    pub stages: Vec<BootstrapStage>,
    pub connect_timeout: Duration,
    pub sync_window: Duration,
    pub poll_interval: Duration,
    pub portal_timeout: Duration,
}

impl BootstrapPolicy {
    pub fn from_config(config: &SwarmConfig) -> Self {
        Self {
            role: config.node.role,
            stages: config.bootstrap.stages.clone(),
            connect_timeout: config.bootstrap.connect_timeout(),
            sync_window: config.sync.window(),
            poll_interval: config.bootstrap.poll_interval(),
            portal_timeout: config.portal.timeout(),
        }
    }

    /// Run the configured stages in order until one yields connectivity.
    pub async fn run(&self, ctx: BootstrapContext<'_>) -> BootstrapOutcome {
        let BootstrapContext {
            store,
            sync,
            mesh,
            station,
            portal,
            device,
        } = ctx;

        station.set_candidates(store.export_auth_candidates());

        for &stage in &self.stages {
            info!(%stage, "bootstrap stage");
            let connected = match stage {
                BootstrapStage::KnownNetworks => station.connect(self.connect_timeout).await,
                BootstrapStage::MeshSync => {
                    if !mesh.is_running() {
                        info!("mesh inactive, skipping sync stage");
                        continue;
                    }
                    if !self.wait_for_sync(store, sync, mesh, device).await {
                        continue;
                    }
                    // Retried once here; the reconnect timer covers later attempts
                    station.set_candidates(store.export_auth_candidates());
                    station.connect(self.connect_timeout).await
                }
                BootstrapStage::Provisioning => {
                    if !self.role.may_provision() {
                        info!(role = %self.role, "battery-powered node never opens provisioning");
                        continue;
                    }
                    // Peers keep getting answered while the operator is away
                    let provision = portal.provision(self.portal_timeout);
                    tokio::pin!(provision);
                    let result = loop {
                        tokio::select! {
                            result = &mut provision => break result,
                            _ = tokio::time::sleep(self.poll_interval) => {
                                if mesh.is_running() && Self::service_mesh(store, sync, mesh, device) {
                                    station.set_candidates(store.export_auth_candidates());
                                }
                            }
                        }
                    };
                    match result {
                        Ok(PortalOutcome::Provisioned(credential)) => {
                            match store.upsert(&credential.ssid, &credential.passphrase) {
                                Ok(doc) => {
                                    if let Err(e) = SyncProtocol::publish(&doc, mesh) {
                                        warn!(error = %e, "failed to push provisioned network");
                                    }
                                    station.set_candidates(store.export_auth_candidates());
                                }
                                Err(e) => {
                                    warn!(error = %e, "failed to store provisioned network");
                                    continue;
                                }
                            }
                            station.connect(self.connect_timeout).await
                        }
                        Ok(PortalOutcome::TimedOut) => {
                            info!("provisioning timed out");
                            continue;
                        }
                        Err(e) => {
                            warn!(error = %e, "provisioning portal failed");
                            continue;
                        }
                    }
                }
            };
            if let ConnectOutcome::Connected { ssid } = connected {
                return BootstrapOutcome::Connected { ssid, stage };
            }
        }

        info!("bootstrap finished without connectivity");
        BootstrapOutcome::Offline
    }

    /// Poll one sync attempt to completion. Returns whether a newer document
    /// was adopted.
    async fn wait_for_sync(
        &self,
        store: &mut ConfigStore,
        sync: &mut SyncProtocol,
        mesh: &mut dyn MeshTransport,
        device: &mut dyn DeviceControl,
    ) -> bool {
        sync.begin(Instant::now(), self.sync_window, mesh);
        loop {
            Self::service_mesh(store, sync, mesh, device);
            if sync.phase().is_finished() {
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        sync.phase() == SyncPhase::Synced
    }

    /// Drain the mesh once. Returns whether a newer document was adopted.
    fn service_mesh(
        store: &mut ConfigStore,
        sync: &mut SyncProtocol,
        mesh: &mut dyn MeshTransport,
        device: &mut dyn DeviceControl,
    ) -> bool {
        let mut adopted = false;
        for event in sync.poll(Instant::now(), store, mesh) {
            match event {
                SyncEvent::Signal(_) => device.blink(),
                SyncEvent::Adopted { .. } => adopted = true,
                _ => {}
            }
        }
        adopted
    }
}
