use serde::{Deserialize, Serialize};

/// One known Wi-Fi network. `ssid` is the unique key within a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub ssid: String,
    #[serde(rename = "pass", default)]
    pub passphrase: String,
}

impl Credential {
    pub fn new(ssid: impl Into<String>, passphrase: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            passphrase: passphrase.into(),
        }
    }
}

/// The replicated document: `{ "version": <uint>, "networks": [...] }`.
///
/// The default value (version 0, no networks) is the "no prior knowledge"
/// state of a fresh node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub networks: Vec<Credential>,
}

impl ConfigDocument {
    pub fn find(&self, ssid: &str) -> Option<&Credential> {
        self.networks.iter().find(|c| c.ssid == ssid)
    }

    /// Insert or overwrite `ssid` in place. Does not touch `version`.
    pub(crate) fn upsert_network(&mut self, ssid: &str, passphrase: &str) {
        match self.networks.iter_mut().find(|c| c.ssid == ssid) {
            Some(existing) => existing.passphrase = passphrase.to_string(),
            None => self.networks.push(Credential::new(ssid, passphrase)),
        }
    }

    pub fn is_newer_than(&self, other: &ConfigDocument) -> bool {
        self.version > other.version
    }
}
