use std::sync::Arc;
use tracing::{info, warn};

use swarm_config::{StationBackend, SwarmConfig};
use swarm_mesh::{MeshNode, MeshOptions};
use swarm_runtime::{
    Collaborators, HostDevice, NmcliStation, NodeRuntime, OfflineStation, RunExit, StationDriver,
    TriggerHandle,
};
use swarm_server::{AdminServer, CaptivePortal};
use swarm_store::{ConfigStore, DiskFileStore};

pub(super) async fn cmd_start(config: SwarmConfig, open_admin: bool) -> swarm_core::Result<()> {
    println!("swarm v{}", env!("CARGO_PKG_VERSION"));
    println!("   Role:     {}", config.node.role);
    println!("   Document: {}", config.document_path().display());
    println!(
        "   Mesh:     {}",
        if config.mesh.enabled {
            format!("{} (topic {})", config.mesh.listen, config.mesh.topic)
        } else {
            "disabled".to_string()
        }
    );
    println!("   Stages:   {}", stage_list(&config));
    println!();

    let trigger = TriggerHandle::default();
    listen_for_trigger(trigger.clone());

    let mesh_options = MeshOptions {
        listen: config.mesh.listen.clone(),
        topic: config.mesh.topic.clone(),
        bootstrap_peers: config.mesh.bootstrap_peers.clone(),
        mdns: config.mesh.mdns,
    };

    let mut open_admin = open_admin;
    let mut cycle = 0u64;
    loop {
        cycle += 1;
        // Every cycle starts from what is on disk, like a fresh boot
        let store = ConfigStore::open(Arc::new(DiskFileStore::new()), config.document_path());
        let parts = Collaborators {
            mesh: Box::new(MeshNode::new(mesh_options.clone())),
            station: station_driver(&config),
            portal: Box::new(CaptivePortal::new(
                config.portal.listen.clone(),
                config.portal.ap_name.clone(),
            )),
            device: Box::new(HostDevice::with_trigger(trigger.clone())),
            admin: Box::new(AdminServer::new(config.admin.listen.clone())),
        };
        let runtime =
            NodeRuntime::from_config(&config, store, parts).with_admin_on_start(open_admin);
        open_admin = false;

        info!(cycle, "node cycle starting");
        let exit = runtime
            .run(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "failed to listen for ctrl-c");
                    std::future::pending::<()>().await;
                }
            })
            .await?;

        match exit {
            RunExit::Restart => info!("restarting node"),
            RunExit::Wake => info!("woke up, starting next cycle"),
            RunExit::Shutdown => {
                info!("node stopped");
                return Ok(());
            }
        }
    }
}

fn stage_list(config: &SwarmConfig) -> String {
    config
        .bootstrap
        .stages
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn station_driver(config: &SwarmConfig) -> Box<dyn StationDriver> {
    match config.station.backend {
        StationBackend::Nmcli => Box::new(NmcliStation::new(config.station.interface.clone())),
        StationBackend::Offline => Box::new(OfflineStation),
    }
}

/// SIGUSR1 stands in for the hardware button that opens the admin surface.
#[cfg(unix)]
fn listen_for_trigger(trigger: TriggerHandle) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut usr1 = match signal(SignalKind::user_defined1()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "trigger signal unavailable; use `swarm start --admin`");
            return;
        }
    };
    println!("   Open the admin surface: kill -USR1 {}", std::process::id());
    tokio::spawn(async move {
        while usr1.recv().await.is_some() {
            info!("trigger pressed");
            trigger.press();
        }
    });
}

#[cfg(not(unix))]
fn listen_for_trigger(_trigger: TriggerHandle) {
    warn!("no trigger source on this platform; use `swarm start --admin`");
}
