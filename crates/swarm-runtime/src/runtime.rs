//! The node's cooperative poll loop.
//!
//! One task owns every collaborator and all mutable node state. Each pass of
//! the loop reads the clock once and then services, in order: mesh traffic,
//! queued admin commands, the admin inactivity window, the trigger button,
//! the reconnect/health timer and (on battery nodes) deep sleep.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::admin::{self, AdminCommand, AdminHandle, AdminSurface, StatusReport};
use crate::bootstrap::{BootstrapContext, BootstrapOutcome, BootstrapPolicy};
use crate::device::DeviceControl;
use crate::portal::ProvisioningPortal;
use crate::station::{ConnectOutcome, Station, StationDriver};
use swarm_config::SwarmConfig;
use swarm_core::{Cadence, NodeRole, Result};
use swarm_mesh::{MeshTransport, Signal, SyncEvent, SyncProtocol};
use swarm_store::{ConfigDocument, ConfigStore};

/// Why [`NodeRuntime::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// A reboot was requested; build a fresh runtime from disk.
    Restart,
    /// The node slept and woke up; start a new wake cycle.
    Wake,
    /// The shutdown future completed.
    Shutdown,
}

/// Loop timings, taken from the `[runtime]`, `[admin]` and `[bootstrap]` tables.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub role: NodeRole,
    pub mesh_enabled: bool,
    pub tick: Duration,
    pub reconnect_interval: Duration,
    pub connect_timeout: Duration,
    pub admin_idle_timeout: Duration,
    pub deep_sleep: Duration,
    pub sleep_grace: Duration,
    pub max_awake: Duration,
    pub open_admin_on_start: bool,
}

impl RuntimeSettings {
    pub fn from_config(config: &SwarmConfig) -> Self {
        Self {
            role: config.node.role,
            mesh_enabled: config.mesh.enabled,
            tick: config.runtime.tick(),
            reconnect_interval: config.runtime.reconnect_interval(),
            connect_timeout: config.bootstrap.connect_timeout(),
            admin_idle_timeout: config.admin.idle_timeout(),
            deep_sleep: config.runtime.deep_sleep(),
            sleep_grace: config.runtime.sleep_grace(),
            max_awake: config.runtime.max_awake(),
            open_admin_on_start: false,
        }
    }
}

/// External collaborators a runtime is built from.
pub struct Collaborators {
    pub mesh: Box<dyn MeshTransport>,
    pub station: Box<dyn StationDriver>,
    pub portal: Box<dyn ProvisioningPortal>,
    pub device: Box<dyn DeviceControl>,
    pub admin: Box<dyn AdminSurface>,
}

#[derive(Debug, Clone)]
struct AdminSession {
    url: String,
    last_activity: Instant,
}

/// Process-wide mutable node state, owned by the loop.
#[derive(Debug)]
pub struct RuntimeState {
    pub mesh_active: bool,
    pub online: bool,
    pub ssid: Option<String>,
    admin: Option<AdminSession>,
    reconnect: Cadence,
    sleep_at: Option<Instant>,
    pending_exit: Option<RunExit>,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl RuntimeState {
    fn new(now: Instant, reconnect_interval: Duration) -> Self {
        Self {
            mesh_active: false,
            online: false,
            ssid: None,
            admin: None,
            reconnect: Cadence::delayed(now, reconnect_interval),
            sleep_at: None,
            pending_exit: None,
            started: now,
            started_at: Utc::now(),
        }
    }

    pub fn admin_active(&self) -> bool {
        self.admin.is_some()
    }

    pub fn admin_url(&self) -> Option<&str> {
        self.admin.as_ref().map(|s| s.url.as_str())
    }
}

pub struct NodeRuntime {
    settings: RuntimeSettings,
    policy: BootstrapPolicy,
    store: ConfigStore,
    sync: SyncProtocol,
    mesh: Box<dyn MeshTransport>,
    station: Station,
    portal: Box<dyn ProvisioningPortal>,
    device: Box<dyn DeviceControl>,
    admin: Box<dyn AdminSurface>,
    admin_handle: AdminHandle,
    admin_rx: mpsc::Receiver<AdminCommand>,
    state: RuntimeState,
}

impl NodeRuntime {
    pub fn new(
        settings: RuntimeSettings,
        policy: BootstrapPolicy,
        sync: SyncProtocol,
        store: ConfigStore,
        parts: Collaborators,
    ) -> Self {
        let (admin_handle, admin_rx) = admin::channel(32);
        let state = RuntimeState::new(Instant::now(), settings.reconnect_interval);
        Self {
            settings,
            policy,
            store,
            sync,
            mesh: parts.mesh,
            station: Station::new(parts.station),
            portal: parts.portal,
            device: parts.device,
            admin: parts.admin,
            admin_handle,
            admin_rx,
            state,
        }
    }

    /// Build a runtime with every setting taken from `config`.
    pub fn from_config(config: &SwarmConfig, store: ConfigStore, parts: Collaborators) -> Self {
        let settings = RuntimeSettings::from_config(config);
        let policy = BootstrapPolicy::from_config(config);
        let sync = SyncProtocol::new(config.node.role, config.sync.resend_interval());
        Self::new(settings, policy, sync, store, parts)
    }

    pub fn with_admin_on_start(mut self, open: bool) -> Self {
        self.settings.open_admin_on_start = open;
        self
    }

    /// A handle for issuing admin commands without going through HTTP.
    pub fn admin_handle(&self) -> AdminHandle {
        self.admin_handle.clone()
    }

    pub fn state(&self) -> &RuntimeState {
        &self.state
    }

    pub fn document(&self) -> &ConfigDocument {
        self.store.document()
    }

    /// Bootstrap, then poll until a reboot, a wake-up or `shutdown`.
    pub async fn run<F>(mut self, shutdown: F) -> Result<RunExit>
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);

        tokio::select! {
            _ = &mut shutdown => {
                self.teardown().await;
                return Ok(RunExit::Shutdown);
            }
            _ = self.start_up() => {}
        }

        loop {
            let now = Instant::now();
            if let Some(exit) = self.step(now).await {
                self.teardown().await;
                return Ok(exit);
            }
            tokio::select! {
                _ = &mut shutdown => {
                    self.teardown().await;
                    return Ok(RunExit::Shutdown);
                }
                _ = tokio::time::sleep(self.settings.tick) => {}
            }
        }
    }

    async fn start_up(&mut self) {
        info!(
            node_id = %self.mesh.node_id(),
            role = %self.settings.role,
            version = self.store.current_version(),
            station = self.station.driver_name(),
            "node starting"
        );

        if self.settings.mesh_enabled {
            match self.mesh.start() {
                Ok(()) => self.state.mesh_active = true,
                Err(e) => warn!(error = %e, "mesh failed to start, continuing without it"),
            }
        }

        let outcome = self
            .policy
            .run(BootstrapContext {
                store: &mut self.store,
                sync: &mut self.sync,
                mesh: self.mesh.as_mut(),
                station: &mut self.station,
                portal: self.portal.as_mut(),
                device: self.device.as_mut(),
            })
            .await;

        if let BootstrapOutcome::Connected { ssid, stage } = outcome {
            info!(%ssid, %stage, "node online");
            self.state.online = true;
            self.state.ssid = Some(ssid);
        }

        let now = Instant::now();
        self.state.reconnect = Cadence::delayed(now, self.settings.reconnect_interval);
        if self.settings.open_admin_on_start {
            self.open_admin(now).await;
        }
    }

    /// One pass of the loop. Returns `Some` when the loop must exit.
    async fn step(&mut self, now: Instant) -> Option<RunExit> {
        self.service_mesh(now);

        while let Ok(cmd) = self.admin_rx.try_recv() {
            if let Some(session) = self.state.admin.as_mut() {
                session.last_activity = now;
            }
            self.execute(cmd, now).await;
        }
        if let Some(exit) = self.state.pending_exit.take() {
            return Some(exit);
        }

        if let Some(session) = &self.state.admin {
            if now.saturating_duration_since(session.last_activity) >= self.settings.admin_idle_timeout {
                info!("admin server idle, closing");
                self.close_admin().await;
            }
        }

        if self.device.take_trigger() && self.state.admin.is_none() {
            self.open_admin(now).await;
        }

        if self.state.reconnect.poll(now) {
            self.check_connectivity().await;
        }

        if self.settings.role.sleeps() {
            return self.maybe_sleep(now).await;
        }
        None
    }

    fn service_mesh(&mut self, now: Instant) {
        if !self.state.mesh_active {
            return;
        }
        for event in self.sync.poll(now, &mut self.store, self.mesh.as_mut()) {
            match event {
                SyncEvent::Adopted { version, from } => {
                    info!(version, peer = %from, "reseeding station after adoption");
                    self.station.set_candidates(self.store.export_auth_candidates());
                }
                SyncEvent::Signal(Signal::FindMe) => self.device.blink(),
                SyncEvent::Answered { peer } => debug!(%peer, "served document"),
                SyncEvent::Stale { .. } => {}
            }
        }
    }

    /// Health check while online, known-network retry while offline.
    async fn check_connectivity(&mut self) {
        if self.state.online {
            if self.station.is_connected().await {
                return;
            }
            warn!(ssid = ?self.state.ssid, "connectivity lost");
            self.state.online = false;
            self.state.ssid = None;
        }
        match self.station.connect(self.settings.connect_timeout).await {
            ConnectOutcome::Connected { ssid } => {
                info!(%ssid, "reconnected");
                self.state.online = true;
                self.state.ssid = Some(ssid);
            }
            ConnectOutcome::NotConnected => debug!("reconnect attempt failed"),
        }
    }

    /// Battery nodes sleep shortly after getting online, or once the awake
    /// window is spent without a link. An open admin surface holds them awake.
    async fn maybe_sleep(&mut self, now: Instant) -> Option<RunExit> {
        if self.state.admin.is_some() {
            self.state.sleep_at = None;
            return None;
        }
        if self.state.online {
            let sleep_at = *self
                .state
                .sleep_at
                .get_or_insert(now + self.settings.sleep_grace);
            if now < sleep_at {
                return None;
            }
        } else {
            self.state.sleep_at = None;
            if now.saturating_duration_since(self.state.started) < self.settings.max_awake {
                return None;
            }
            info!(
                awake_secs = now.saturating_duration_since(self.state.started).as_secs(),
                "still offline, sleeping until the next wake"
            );
        }
        self.mesh.stop();
        self.state.mesh_active = false;
        self.device.deep_sleep(self.settings.deep_sleep).await;
        Some(RunExit::Wake)
    }

    async fn open_admin(&mut self, now: Instant) {
        match self.admin.open(self.admin_handle.clone()).await {
            Ok(url) => {
                info!(%url, "admin server opened");
                self.state.admin = Some(AdminSession {
                    url,
                    last_activity: now,
                });
            }
            Err(e) => warn!(error = %e, "failed to open admin server"),
        }
    }

    async fn close_admin(&mut self) {
        if self.state.admin.take().is_some() {
            self.admin.close().await;
        }
    }

    async fn execute(&mut self, cmd: AdminCommand, now: Instant) {
        match cmd {
            AdminCommand::Status(reply) => {
                let _ = reply.send(self.status_report(now));
            }
            AdminCommand::Scan(reply) => {
                let _ = reply.send(self.station.scan().await);
            }
            AdminCommand::AddNetwork {
                ssid,
                passphrase,
                reply,
            } => {
                let result = self.store.upsert(&ssid, &passphrase);
                if let Ok(doc) = &result {
                    self.propagate(doc);
                }
                let _ = reply.send(result);
            }
            AdminCommand::RemoveNetwork { index, reply } => {
                let result = self.store.remove(index);
                if let Ok(doc) = &result {
                    self.propagate(doc);
                }
                let _ = reply.send(result);
            }
            AdminCommand::Blink(reply) => {
                self.device.blink();
                let result = if self.state.mesh_active {
                    SyncProtocol::send_signal(Signal::FindMe, self.mesh.as_mut())
                } else {
                    Ok(())
                };
                let _ = reply.send(result);
            }
            AdminCommand::Reboot(reply) => {
                info!("reboot requested");
                let _ = reply.send(());
                self.state.pending_exit = Some(RunExit::Restart);
            }
        }
    }

    /// Push a persisted local edit to the swarm and the station.
    fn propagate(&mut self, doc: &ConfigDocument) {
        self.station.set_candidates(doc.networks.clone());
        if !self.state.mesh_active {
            return;
        }
        if let Err(e) = SyncProtocol::publish(doc, self.mesh.as_mut()) {
            warn!(error = %e, version = doc.version, "failed to push document");
        }
    }

    fn status_report(&self, now: Instant) -> StatusReport {
        let doc = self.store.document();
        StatusReport {
            node_id: self.mesh.node_id(),
            role: self.settings.role,
            online: self.state.online,
            ssid: self.state.ssid.clone(),
            version: doc.version,
            networks: doc.networks.iter().map(|c| c.ssid.clone()).collect(),
            mesh_active: self.state.mesh_active,
            peers: if self.state.mesh_active {
                self.mesh.peers()
            } else {
                Vec::new()
            },
            sync_phase: self.sync.phase().to_string(),
            admin_url: self.state.admin_url().map(str::to_string),
            started_at: self.state.started_at,
            uptime_secs: now.saturating_duration_since(self.state.started).as_secs(),
        }
    }

    async fn teardown(&mut self) {
        self.close_admin().await;
        self.mesh.stop();
        self.state.mesh_active = false;
    }
}
