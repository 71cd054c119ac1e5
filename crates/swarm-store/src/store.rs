use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::document::{ConfigDocument, Credential};
use crate::fs::FileStore;
use swarm_core::{Result, SwarmError};

/// Exclusive owner of the node's network document.
///
/// Every mutation builds the next document, persists it, and only then swaps
/// it in, so the in-memory copy never runs ahead of the persisted one. A
/// failed write leaves both untouched.
pub struct ConfigStore {
    files: Arc<dyn FileStore>,
    path: PathBuf,
    doc: ConfigDocument,
}

impl ConfigStore {
    /// Open the store, reading the persisted document.
    ///
    /// A missing or unreadable file is not an error: the node starts from the
    /// zero document and stays reachable for provisioning.
    pub fn open(files: Arc<dyn FileStore>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let doc = read_document(files.as_ref(), &path);
        info!(
            path = %path.display(),
            version = doc.version,
            networks = doc.networks.len(),
            "network document loaded"
        );
        Self { files, path, doc }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document from durable storage.
    pub fn load(&self) -> ConfigDocument {
        read_document(self.files.as_ref(), &self.path)
    }

    /// The in-memory document (identical to the persisted one).
    pub fn document(&self) -> &ConfigDocument {
        &self.doc
    }

    pub fn current_version(&self) -> u32 {
        self.doc.version
    }

    /// Add `ssid` or overwrite its passphrase, bump the version, persist.
    pub fn upsert(&mut self, ssid: &str, passphrase: &str) -> Result<ConfigDocument> {
        if ssid.trim().is_empty() {
            return Err(SwarmError::InvalidCredential("ssid must not be empty".into()));
        }
        let mut next = self.doc.clone();
        next.upsert_network(ssid, passphrase);
        next.version = self.next_version()?;
        self.commit(next)?;
        info!(ssid, version = self.doc.version, "network stored");
        Ok(self.doc.clone())
    }

    /// Remove the network at `index`, bump the version, persist.
    pub fn remove(&mut self, index: usize) -> Result<ConfigDocument> {
        let len = self.doc.networks.len();
        if index >= len {
            return Err(SwarmError::IndexOutOfBounds { index, len });
        }
        let mut next = self.doc.clone();
        let removed = next.networks.remove(index);
        next.version = self.next_version()?;
        self.commit(next)?;
        info!(ssid = %removed.ssid, version = self.doc.version, "network removed");
        Ok(self.doc.clone())
    }

    /// Adopt `remote` wholesale iff its version is strictly newer.
    ///
    /// Returns whether the document was adopted. Stale or equal versions are
    /// ignored, which makes duplicate and out-of-order delivery harmless.
    pub fn merge(&mut self, remote: ConfigDocument) -> Result<bool> {
        if !remote.is_newer_than(&self.doc) {
            debug!(
                local = self.doc.version,
                remote = remote.version,
                "ignoring stale document"
            );
            return Ok(false);
        }
        let from = self.doc.version;
        self.commit(remote)?;
        info!(from, to = self.doc.version, "adopted newer document from swarm");
        Ok(true)
    }

    /// Credentials to seed the station driver with.
    pub fn export_auth_candidates(&self) -> Vec<Credential> {
        self.doc.networks.clone()
    }

    fn next_version(&self) -> Result<u32> {
        self.doc
            .version
            .checked_add(1)
            .ok_or_else(|| SwarmError::Storage("document version exhausted".into()))
    }

    fn commit(&mut self, next: ConfigDocument) -> Result<()> {
        let bytes = serde_json::to_vec(&next)?;
        if let Err(e) = self.files.write(&self.path, &bytes) {
            error!(path = %self.path.display(), error = %e, "failed to persist network document");
            return Err(SwarmError::Storage(format!(
                "failed to write {}: {e}",
                self.path.display()
            )));
        }
        self.doc = next;
        Ok(())
    }
}

fn read_document(files: &dyn FileStore, path: &Path) -> ConfigDocument {
    if !files.exists(path) {
        return ConfigDocument::default();
    }
    let bytes = match files.read(path) {
        Ok(b) => b,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read network document, starting empty");
            return ConfigDocument::default();
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "network document is corrupt, starting empty");
            ConfigDocument::default()
        }
    }
}
