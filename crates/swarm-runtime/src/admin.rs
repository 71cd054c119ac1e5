//! Administrative access to a running node.
//!
//! The admin surface never touches the document itself. Each request becomes
//! an [`AdminCommand`] on a bounded queue that the poll loop drains, so the
//! loop stays the only writer of the [`ConfigStore`](swarm_store::ConfigStore).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::station::ScanEntry;
use swarm_core::{NodeId, NodeRole, Result, SwarmError};
use swarm_store::ConfigDocument;

/// Snapshot of a node, rendered by the status page and `/api/v1/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub node_id: NodeId,
    pub role: NodeRole,
    pub online: bool,
    pub ssid: Option<String>,
    pub version: u32,
    /// Stored SSIDs in document order (passphrases are never reported).
    pub networks: Vec<String>,
    pub mesh_active: bool,
    pub peers: Vec<NodeId>,
    pub sync_phase: String,
    pub admin_url: Option<String>,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

/// Requests executed by the poll loop on behalf of the admin surface.
#[derive(Debug)]
pub enum AdminCommand {
    Status(oneshot::Sender<StatusReport>),
    Scan(oneshot::Sender<Result<Vec<ScanEntry>>>),
    AddNetwork {
        ssid: String,
        passphrase: String,
        reply: oneshot::Sender<Result<ConfigDocument>>,
    },
    RemoveNetwork {
        index: usize,
        reply: oneshot::Sender<Result<ConfigDocument>>,
    },
    /// Blink locally and broadcast the find-me signal.
    Blink(oneshot::Sender<Result<()>>),
    Reboot(oneshot::Sender<()>),
}

/// Cloneable sender side of the admin queue.
#[derive(Debug, Clone)]
pub struct AdminHandle {
    tx: mpsc::Sender<AdminCommand>,
}

/// Create an admin queue holding at most `capacity` pending commands.
pub fn channel(capacity: usize) -> (AdminHandle, mpsc::Receiver<AdminCommand>) {
    let (tx, rx) = mpsc::channel(capacity);
    (AdminHandle { tx }, rx)
}

impl AdminHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> AdminCommand) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| SwarmError::Server("node runtime is not running".into()))?;
        rx.await
            .map_err(|_| SwarmError::Server("node runtime dropped the request".into()))
    }

    pub async fn status(&self) -> Result<StatusReport> {
        self.request(AdminCommand::Status).await
    }

    pub async fn scan(&self) -> Result<Vec<ScanEntry>> {
        self.request(AdminCommand::Scan).await?
    }

    pub async fn add_network(&self, ssid: &str, passphrase: &str) -> Result<ConfigDocument> {
        self.request(|reply| AdminCommand::AddNetwork {
            ssid: ssid.to_string(),
            passphrase: passphrase.to_string(),
            reply,
        })
        .await?
    }

    pub async fn remove_network(&self, index: usize) -> Result<ConfigDocument> {
        self.request(|reply| AdminCommand::RemoveNetwork { index, reply })
            .await?
    }

    pub async fn blink(&self) -> Result<()> {
        self.request(AdminCommand::Blink).await?
    }

    pub async fn reboot(&self) -> Result<()> {
        self.request(AdminCommand::Reboot).await
    }
}

/// The admin web server as seen by the runtime.
#[async_trait]
pub trait AdminSurface: Send {
    /// Start serving requests through `handle`. Returns the URL to reach it.
    async fn open(&mut self, handle: AdminHandle) -> Result<String>;

    /// Stop serving. No-op when closed.
    async fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handle_fails_when_runtime_gone() {
        let (handle, rx) = channel(4);
        drop(rx);
        assert!(matches!(handle.status().await, Err(SwarmError::Server(_))));
    }

    #[tokio::test]
    async fn test_handle_round_trip() {
        let (handle, mut rx) = channel(4);
        let responder = tokio::spawn(async move {
            if let Some(AdminCommand::RemoveNetwork { index, reply }) = rx.recv().await {
                let _ = reply.send(Err(SwarmError::IndexOutOfBounds { index, len: 0 }));
            }
        });
        let result = handle.remove_network(3).await;
        assert!(matches!(
            result,
            Err(SwarmError::IndexOutOfBounds { index: 3, len: 0 })
        ));
        responder.await.unwrap();
    }
}
