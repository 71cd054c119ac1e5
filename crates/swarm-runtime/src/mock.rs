//! Scriptable collaborators for deterministic tests.
//!
//! Every mock is `Clone` and shares its state, so a test keeps one copy for
//! assertions and hands the other to the runtime.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::admin::{AdminHandle, AdminSurface};
use crate::device::DeviceControl;
use crate::portal::{PortalOutcome, ProvisioningPortal};
use crate::station::{ScanEntry, StationDriver, StationStatus};
use swarm_core::{Result, SwarmError};
use swarm_store::Credential;

// ─── Station ────────────────────────────────────────────────────

#[derive(Default)]
struct StationState {
    /// ssid -> (passphrase, signal)
    in_range: HashMap<String, (String, u8)>,
    connected: Option<String>,
    joins: Vec<String>,
    fail_scan: bool,
}

/// A radio environment of networks that accept exactly one passphrase.
#[derive(Clone, Default)]
pub struct MockStation {
    state: Arc<Mutex<StationState>>,
}

impl MockStation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a network in range.
    pub fn with_network(self, ssid: &str, passphrase: &str, signal: u8) -> Self {
        self.add_network(ssid, passphrase, signal);
        self
    }

    pub fn add_network(&self, ssid: &str, passphrase: &str, signal: u8) {
        self.state
            .lock()
            .in_range
            .insert(ssid.to_string(), (passphrase.to_string(), signal));
    }

    /// Take a network out of range, dropping the link if it was in use.
    pub fn remove_network(&self, ssid: &str) {
        let mut state = self.state.lock();
        state.in_range.remove(ssid);
        if state.connected.as_deref() == Some(ssid) {
            state.connected = None;
        }
    }

    pub fn set_fail_scan(&self, fail: bool) {
        self.state.lock().fail_scan = fail;
    }

    /// Every SSID a join was attempted on, in order.
    pub fn joins(&self) -> Vec<String> {
        self.state.lock().joins.clone()
    }

    pub fn connected(&self) -> Option<String> {
        self.state.lock().connected.clone()
    }
}

#[async_trait]
impl StationDriver for MockStation {
    fn name(&self) -> &str {
        "mock"
    }

    async fn scan(&mut self) -> Result<Vec<ScanEntry>> {
        let state = self.state.lock();
        if state.fail_scan {
            return Err(SwarmError::Station("scan failed".into()));
        }
        let mut entries: Vec<ScanEntry> = state
            .in_range
            .iter()
            .map(|(ssid, (_, signal))| ScanEntry {
                ssid: ssid.clone(),
                signal: *signal,
                secured: true,
            })
            .collect();
        entries.sort_by(|a, b| a.ssid.cmp(&b.ssid));
        Ok(entries)
    }

    async fn join(&mut self, credential: &Credential, _timeout: Duration) -> Result<bool> {
        let mut state = self.state.lock();
        state.joins.push(credential.ssid.clone());
        let accepted = state
            .in_range
            .get(&credential.ssid)
            .is_some_and(|(pass, _)| *pass == credential.passphrase);
        if accepted {
            state.connected = Some(credential.ssid.clone());
        }
        Ok(accepted)
    }

    async fn status(&mut self) -> Result<StationStatus> {
        let state = self.state.lock();
        Ok(StationStatus {
            connected: state.connected.is_some(),
            ssid: state.connected.clone(),
        })
    }
}

// ─── Portal ─────────────────────────────────────────────────────

#[derive(Default)]
struct PortalState {
    credential: Option<Credential>,
    /// How long each session stays open, capped by its timeout.
    delay: Duration,
    calls: usize,
    timeouts: Vec<Duration>,
}

/// A portal where the operator either submits a fixed credential or never shows up.
#[derive(Clone, Default)]
pub struct MockPortal {
    state: Arc<Mutex<PortalState>>,
}

impl MockPortal {
    /// Every session times out.
    pub fn timing_out() -> Self {
        Self::default()
    }

    /// Every session yields `credential`.
    pub fn providing(credential: Credential) -> Self {
        let portal = Self::default();
        portal.state.lock().credential = Some(credential);
        portal
    }

    /// Keep every session open for `delay` before it resolves.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.lock().delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.state.lock().calls
    }

    pub fn timeouts(&self) -> Vec<Duration> {
        self.state.lock().timeouts.clone()
    }
}

#[async_trait]
impl ProvisioningPortal for MockPortal {
    async fn provision(&mut self, timeout: Duration) -> Result<PortalOutcome> {
        let (credential, delay) = {
            let mut state = self.state.lock();
            state.calls += 1;
            state.timeouts.push(timeout);
            (state.credential.clone(), state.delay)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay.min(timeout)).await;
        }
        Ok(match credential {
            Some(credential) => PortalOutcome::Provisioned(credential),
            None => PortalOutcome::TimedOut,
        })
    }
}

// ─── Device ─────────────────────────────────────────────────────

#[derive(Default)]
struct DeviceState {
    blinks: usize,
    trigger: bool,
    sleeps: Vec<Duration>,
}

#[derive(Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&self) {
        self.state.lock().trigger = true;
    }

    pub fn blinks(&self) -> usize {
        self.state.lock().blinks
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.state.lock().sleeps.clone()
    }
}

#[async_trait]
impl DeviceControl for MockDevice {
    fn blink(&mut self) {
        self.state.lock().blinks += 1;
    }

    fn take_trigger(&mut self) -> bool {
        std::mem::take(&mut self.state.lock().trigger)
    }

    async fn deep_sleep(&mut self, duration: Duration) {
        self.state.lock().sleeps.push(duration);
    }
}

// ─── Admin surface ──────────────────────────────────────────────

#[derive(Default)]
struct AdminState {
    handle: Option<AdminHandle>,
    opens: usize,
    closes: usize,
}

/// Records open/close calls and keeps the handle the runtime passed in.
#[derive(Clone, Default)]
pub struct MockAdminSurface {
    state: Arc<Mutex<AdminState>>,
}

impl MockAdminSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opens(&self) -> usize {
        self.state.lock().opens
    }

    pub fn closes(&self) -> usize {
        self.state.lock().closes
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().handle.is_some()
    }

    /// The handle given to the last `open`, while open.
    pub fn handle(&self) -> Option<AdminHandle> {
        self.state.lock().handle.clone()
    }
}

#[async_trait]
impl AdminSurface for MockAdminSurface {
    async fn open(&mut self, handle: AdminHandle) -> Result<String> {
        let mut state = self.state.lock();
        state.opens += 1;
        state.handle = Some(handle);
        Ok("http://127.0.0.1:8000/".to_string())
    }

    async fn close(&mut self) {
        let mut state = self.state.lock();
        state.closes += 1;
        state.handle = None;
    }
}
