use std::sync::Arc;

use swarm_config::SwarmConfig;
use swarm_store::{ConfigDocument, ConfigStore, DiskFileStore};

use super::NetworkAction;

fn open_store(config: &SwarmConfig) -> ConfigStore {
    ConfigStore::open(Arc::new(DiskFileStore::new()), config.document_path())
}

pub(super) fn cmd_networks(config: &SwarmConfig, action: NetworkAction) -> swarm_core::Result<()> {
    let mut store = open_store(config);
    match action {
        NetworkAction::List => print!("{}", render(store.document())),
        NetworkAction::Add { ssid, passphrase } => {
            let doc = store.upsert(&ssid, &passphrase)?;
            println!("Stored '{ssid}' (document v{})", doc.version);
            println!("   The node shares it with the swarm after its next restart.");
        }
        NetworkAction::Remove { index } => {
            let removed = store
                .document()
                .networks
                .get(index)
                .map(|c| c.ssid.clone());
            let doc = store.remove(index)?;
            if let Some(ssid) = removed {
                println!("Removed '{ssid}' (document v{})", doc.version);
            }
        }
    }
    Ok(())
}

/// Print the persisted document without modifying it.
pub(super) fn print_document(config: &SwarmConfig) -> swarm_core::Result<()> {
    print!("{}", render(open_store(config).document()));
    Ok(())
}

fn render(doc: &ConfigDocument) -> String {
    if doc.networks.is_empty() {
        return format!("No networks stored (document v{}).\n", doc.version);
    }
    let mut out = format!("Document v{}\n", doc.version);
    for (i, credential) in doc.networks.iter().enumerate() {
        let secured = if credential.passphrase.is_empty() {
            "open"
        } else {
            "secured"
        };
        out.push_str(&format!("  [{i}] {} ({secured})\n", credential.ssid));
    }
    out
}
