use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use swarm_core::NodeRole;

/// Root configuration, mapped from `swarm.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    pub node: NodeConfig,
    pub mesh: MeshConfig,
    pub sync: SyncConfig,
    pub bootstrap: BootstrapConfig,
    pub portal: PortalConfig,
    pub admin: AdminConfig,
    pub runtime: RuntimeConfig,
    pub station: StationConfig,
    pub logging: LoggingConfig,
}

// ── Node ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// "always-on" (answers sync requests, may open the portal) or "battery-powered".
    pub role: NodeRole,
    /// Directory holding the persisted network document.
    pub data_dir: PathBuf,
    /// File name of the network document inside `data_dir`.
    pub document_file: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            role: NodeRole::AlwaysOn,
            data_dir: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".swarm"),
            document_file: "networks.json".into(),
        }
    }
}

// ── Mesh ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Enable mesh networking.
    pub enabled: bool,
    /// Listen multiaddr for the mesh transport.
    pub listen: String,
    /// GossipSub topic shared by every node of one swarm.
    pub topic: String,
    /// Known bootstrap peers (multiaddrs).
    pub bootstrap_peers: Vec<String>,
    /// Enable mDNS for local discovery.
    pub mdns: bool,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: "/ip4/0.0.0.0/tcp/5555".into(),
            topic: "ESP32_SWARM_NET".into(),
            bootstrap_peers: vec![],
            mdns: true,
        }
    }
}

// ── Sync ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How long one sync attempt waits for a fresher document.
    pub window_secs: u64,
    /// Interval between `SYNC_REQ` broadcasts while requesting.
    pub resend_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            window_secs: 15,
            resend_secs: 3,
        }
    }
}

impl SyncConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn resend_interval(&self) -> Duration {
        Duration::from_secs(self.resend_secs)
    }
}

// ── Bootstrap ──────────────────────────────────────────────────

/// One stage of the startup fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BootstrapStage {
    KnownNetworks,
    MeshSync,
    Provisioning,
}

impl std::fmt::Display for BootstrapStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BootstrapStage::KnownNetworks => "known-networks",
            BootstrapStage::MeshSync => "mesh-sync",
            BootstrapStage::Provisioning => "provisioning",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Fallback chain, executed in order until the node is online.
    pub stages: Vec<BootstrapStage>,
    /// Upper bound for one station connect attempt.
    pub connect_timeout_secs: u64,
    /// Sleep between transport polls during the mesh-sync wait.
    pub poll_interval_ms: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            stages: vec![
                BootstrapStage::KnownNetworks,
                BootstrapStage::MeshSync,
                BootstrapStage::Provisioning,
            ],
            connect_timeout_secs: 10,
            poll_interval_ms: 20,
        }
    }
}

impl BootstrapConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// ── Portal ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Listen address of the captive provisioning portal.
    pub listen: String,
    /// Name shown on the portal page (the access point name on devices with a radio).
    pub ap_name: String,
    /// How long the portal stays open waiting for credentials.
    pub timeout_secs: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".into(),
            ap_name: "ESP32_SWARM_AP".into(),
            timeout_secs: 180,
        }
    }
}

impl PortalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ── Admin ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Listen address of the admin web server.
    pub listen: String,
    /// Close the admin server after this long without a request.
    pub idle_timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8000".into(),
            idle_timeout_secs: 300,
        }
    }
}

impl AdminConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

// ── Runtime ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Retry known networks this often while offline.
    pub reconnect_interval_secs: u64,
    /// Deep-sleep duration for battery nodes once their work is done.
    pub deep_sleep_secs: u64,
    /// Pause before deep sleep so in-flight mesh traffic can flush.
    pub sleep_grace_secs: u64,
    /// Longest awake window of a battery node that cannot get online.
    pub max_awake_secs: u64,
    /// Poll loop period.
    pub tick_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            reconnect_interval_secs: 60,
            deep_sleep_secs: 600,
            sleep_grace_secs: 2,
            max_awake_secs: 60,
            tick_ms: 20,
        }
    }
}

impl RuntimeConfig {
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs)
    }

    pub fn deep_sleep(&self) -> Duration {
        Duration::from_secs(self.deep_sleep_secs)
    }

    pub fn sleep_grace(&self) -> Duration {
        Duration::from_secs(self.sleep_grace_secs)
    }

    pub fn max_awake(&self) -> Duration {
        Duration::from_secs(self.max_awake_secs)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

// ── Station ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StationBackend {
    /// Drive the host Wi-Fi through NetworkManager's `nmcli`.
    Nmcli,
    /// No radio: never connects, scans nothing.
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub backend: StationBackend,
    /// Wireless interface to use (None = let the backend choose).
    pub interface: Option<String>,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            backend: StationBackend::Nmcli,
            interface: None,
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty" or "json".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            WarningSeverity::Error => "error",
            WarningSeverity::Warning => "warning",
            WarningSeverity::Info => "info",
        };
        write!(f, "{}: {}: {}", label, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

impl SwarmConfig {
    /// Path of the persisted network document.
    pub fn document_path(&self) -> PathBuf {
        self.node.data_dir.join(&self.node.document_file)
    }

    /// Validate the config and return a list of warnings/errors.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Bootstrap chain ───
        if self.bootstrap.stages.is_empty() {
            warnings.push(ConfigWarning {
                field: "bootstrap.stages".into(),
                message: "no bootstrap stages configured; the node can never come online".into(),
                severity: WarningSeverity::Error,
                hint: Some("Use e.g. [\"known-networks\", \"mesh-sync\", \"provisioning\"]".into()),
            });
        }
        if self.node.role.is_battery_powered()
            && self.bootstrap.stages.contains(&BootstrapStage::Provisioning)
        {
            warnings.push(ConfigWarning {
                field: "bootstrap.stages".into(),
                message: "battery-powered nodes never open the provisioning portal".into(),
                severity: WarningSeverity::Warning,
                hint: Some("The provisioning stage will be skipped on this node".into()),
            });
        }
        if self.bootstrap.poll_interval_ms == 0 {
            warnings.push(ConfigWarning {
                field: "bootstrap.poll_interval_ms".into(),
                message: "poll interval is 0; the sync wait would spin".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 20".into()),
            });
        }

        // ── Sync timing ───
        if self.sync.window_secs == 0 {
            warnings.push(ConfigWarning {
                field: "sync.window_secs".into(),
                message: "sync window is 0; mesh sync would time out immediately".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 15".into()),
            });
        } else if self.sync.resend_secs == 0 || self.sync.resend_secs >= self.sync.window_secs {
            warnings.push(ConfigWarning {
                field: "sync.resend_secs".into(),
                message: format!(
                    "resend interval {}s must be non-zero and shorter than the {}s window",
                    self.sync.resend_secs, self.sync.window_secs
                ),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 3".into()),
            });
        }

        // ── Mesh ───
        if self.mesh.enabled && self.mesh.topic.trim().is_empty() {
            warnings.push(ConfigWarning {
                field: "mesh.topic".into(),
                message: "mesh topic is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("All nodes of one swarm must share the same topic".into()),
            });
        }
        if !self.mesh.enabled {
            warnings.push(ConfigWarning {
                field: "mesh.enabled".into(),
                message: "mesh disabled; this node will neither learn nor share networks".into(),
                severity: WarningSeverity::Info,
                hint: None,
            });
        }

        // ── Runtime ───
        if self.runtime.tick_ms == 0 {
            warnings.push(ConfigWarning {
                field: "runtime.tick_ms".into(),
                message: "tick period is 0".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 20".into()),
            });
        }
        if self.node.role == NodeRole::BatteryPowered
            && self.runtime.max_awake_secs <= self.sync.window_secs
        {
            warnings.push(ConfigWarning {
                field: "runtime.max_awake_secs".into(),
                message: format!(
                    "awake window ({}s) ends before the sync window ({}s)",
                    self.runtime.max_awake_secs, self.sync.window_secs
                ),
                severity: WarningSeverity::Warning,
                hint: Some("An offline battery node would sleep before hearing from the swarm".into()),
            });
        }

        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| w.to_string())
            .collect();
        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(errors.join("\n"))
        }
    }
}
