//! Station-mode Wi-Fi: the driver collaborator and candidate selection.
//!
//! [`Station`] holds the candidate list seeded from the network document and
//! decides which candidates to try and in what order. The actual radio work
//! sits behind [`StationDriver`]: [`NmcliStation`] drives NetworkManager on a
//! Linux host, [`OfflineStation`] never connects.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use swarm_core::{Deadline, Result, SwarmError};
use swarm_store::Credential;

/// One network seen by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEntry {
    pub ssid: String,
    /// Signal quality, 0–100.
    pub signal: u8,
    pub secured: bool,
}

/// Link state reported by the driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationStatus {
    pub connected: bool,
    pub ssid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected { ssid: String },
    NotConnected,
}

impl ConnectOutcome {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectOutcome::Connected { .. })
    }
}

/// Radio operations of a Wi-Fi station interface.
#[async_trait]
pub trait StationDriver: Send {
    fn name(&self) -> &str;

    async fn scan(&mut self) -> Result<Vec<ScanEntry>>;

    /// Try to associate with one network. `Ok(false)` means the network
    /// refused or did not answer within `timeout`.
    async fn join(&mut self, credential: &Credential, timeout: Duration) -> Result<bool>;

    async fn status(&mut self) -> Result<StationStatus>;
}

/// Keep only candidates that a scan saw, strongest signal first.
///
/// Ties keep document order.
pub fn select_candidates(candidates: &[Credential], scan: &[ScanEntry]) -> Vec<Credential> {
    let mut seen: Vec<(u8, &Credential)> = candidates
        .iter()
        .filter_map(|c| {
            scan.iter()
                .filter(|e| e.ssid == c.ssid)
                .map(|e| e.signal)
                .max()
                .map(|signal| (signal, c))
        })
        .collect();
    seen.sort_by(|a, b| b.0.cmp(&a.0));
    seen.into_iter().map(|(_, c)| c.clone()).collect()
}

/// The station interface plus the credentials it may use.
pub struct Station {
    driver: Box<dyn StationDriver>,
    candidates: Vec<Credential>,
}

impl Station {
    pub fn new(driver: Box<dyn StationDriver>) -> Self {
        Self {
            driver,
            candidates: Vec::new(),
        }
    }

    pub fn driver_name(&self) -> &str {
        self.driver.name()
    }

    /// Replace the candidate list (after load, merge or upsert).
    pub fn set_candidates(&mut self, candidates: Vec<Credential>) {
        debug!(count = candidates.len(), "station candidates updated");
        self.candidates = candidates;
    }

    pub fn candidates(&self) -> &[Credential] {
        &self.candidates
    }

    pub async fn scan(&mut self) -> Result<Vec<ScanEntry>> {
        self.driver.scan().await
    }

    pub async fn status(&mut self) -> Result<StationStatus> {
        self.driver.status().await
    }

    pub async fn is_connected(&mut self) -> bool {
        match self.driver.status().await {
            Ok(status) => status.connected,
            Err(e) => {
                warn!(error = %e, "station status check failed");
                false
            }
        }
    }

    /// Try the known candidates, best signal first, within `timeout` overall.
    ///
    /// When the scan fails every candidate is tried in document order.
    pub async fn connect(&mut self, timeout: Duration) -> ConnectOutcome {
        if self.candidates.is_empty() {
            debug!("no known networks to try");
            return ConnectOutcome::NotConnected;
        }
        let deadline = Deadline::after(Instant::now(), timeout);

        let ordered = match self.driver.scan().await {
            Ok(scan) => select_candidates(&self.candidates, &scan),
            Err(e) => {
                warn!(error = %e, "scan failed, trying every known network");
                self.candidates.clone()
            }
        };
        if ordered.is_empty() {
            info!(known = self.candidates.len(), "no known network in range");
            return ConnectOutcome::NotConnected;
        }

        for candidate in ordered {
            let remaining = deadline.remaining(Instant::now());
            if remaining.is_zero() {
                info!("connect budget exhausted");
                break;
            }
            match self.driver.join(&candidate, remaining).await {
                Ok(true) => {
                    info!(ssid = %candidate.ssid, driver = self.driver.name(), "station connected");
                    return ConnectOutcome::Connected {
                        ssid: candidate.ssid,
                    };
                }
                Ok(false) => debug!(ssid = %candidate.ssid, "network did not accept connection"),
                Err(e) => warn!(ssid = %candidate.ssid, error = %e, "join failed"),
            }
        }
        ConnectOutcome::NotConnected
    }
}

// ─── NetworkManager ─────────────────────────────────────────────

/// Station driver backed by the `nmcli` command-line client.
pub struct NmcliStation {
    interface: Option<String>,
    command_timeout: Duration,
}

impl NmcliStation {
    pub fn new(interface: Option<String>) -> Self {
        Self {
            interface,
            command_timeout: Duration::from_secs(30),
        }
    }

    async fn nmcli(&self, args: &[&str], timeout: Duration) -> Result<String> {
        let mut cmd = tokio::process::Command::new("nmcli");
        cmd.args(args);
        if let Some(ref iface) = self.interface {
            if args.contains(&"wifi") {
                cmd.arg("ifname").arg(iface);
            }
        }
        cmd.kill_on_drop(true);

        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| SwarmError::Station("nmcli timed out".into()))?
            .map_err(|e| SwarmError::Station(format!("nmcli not found or failed: {e}")))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(SwarmError::Station(format!("nmcli error: {}", stderr.trim())))
        }
    }
}

#[async_trait]
impl StationDriver for NmcliStation {
    fn name(&self) -> &str {
        "nmcli"
    }

    async fn scan(&mut self) -> Result<Vec<ScanEntry>> {
        let out = self
            .nmcli(
                &["-t", "-f", "SSID,SIGNAL,SECURITY", "device", "wifi", "list", "--rescan", "auto"],
                self.command_timeout,
            )
            .await?;
        Ok(parse_wifi_list(&out))
    }

    async fn join(&mut self, credential: &Credential, timeout: Duration) -> Result<bool> {
        let mut args = vec!["device", "wifi", "connect", credential.ssid.as_str()];
        if !credential.passphrase.is_empty() {
            args.push("password");
            args.push(credential.passphrase.as_str());
        }
        let wait = timeout.as_secs().max(1).to_string();
        let mut full = vec!["--wait", wait.as_str()];
        full.extend(args);
        match self.nmcli(&full, timeout + Duration::from_secs(1)).await {
            Ok(_) => Ok(true),
            Err(SwarmError::Station(reason)) if reason.starts_with("nmcli error") => {
                debug!(ssid = %credential.ssid, reason, "nmcli refused connection");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn status(&mut self) -> Result<StationStatus> {
        let out = self
            .nmcli(
                &["-t", "-f", "DEVICE,TYPE,STATE,CONNECTION", "device", "status"],
                self.command_timeout,
            )
            .await?;
        Ok(parse_device_status(&out, self.interface.as_deref()))
    }
}

/// Split one line of `nmcli -t` output, honouring `\:` and `\\` escapes.
fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

fn parse_wifi_list(out: &str) -> Vec<ScanEntry> {
    out.lines()
        .filter_map(|line| {
            let fields = split_terse(line);
            let ssid = fields.first()?.trim().to_string();
            if ssid.is_empty() {
                // Hidden networks
                return None;
            }
            let signal = fields.get(1)?.trim().parse::<u8>().ok()?.min(100);
            let security = fields.get(2).map(|s| s.trim()).unwrap_or("");
            Some(ScanEntry {
                ssid,
                signal,
                secured: !security.is_empty() && security != "--",
            })
        })
        .collect()
}

fn parse_device_status(out: &str, interface: Option<&str>) -> StationStatus {
    for line in out.lines() {
        let fields = split_terse(line);
        if fields.len() < 4 || fields[1] != "wifi" {
            continue;
        }
        if interface.is_some_and(|iface| iface != fields[0]) {
            continue;
        }
        if fields[2] == "connected" {
            return StationStatus {
                connected: true,
                ssid: Some(fields[3].clone()).filter(|s| !s.is_empty()),
            };
        }
    }
    StationStatus::default()
}

// ─── Offline ────────────────────────────────────────────────────

/// A station with no radio. Scans see nothing and joins never succeed.
#[derive(Debug, Default)]
pub struct OfflineStation;

#[async_trait]
impl StationDriver for OfflineStation {
    fn name(&self) -> &str {
        "offline"
    }

    async fn scan(&mut self) -> Result<Vec<ScanEntry>> {
        Ok(Vec::new())
    }

    async fn join(&mut self, _credential: &Credential, _timeout: Duration) -> Result<bool> {
        Ok(false)
    }

    async fn status(&mut self) -> Result<StationStatus> {
        Ok(StationStatus::default())
    }
}
