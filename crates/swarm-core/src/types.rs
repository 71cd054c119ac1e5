use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a node in the mesh (the transport's peer id, rendered as a string).
pub type NodeId = String;

/// How a node is powered. Fixed at construction for the process lifetime.
///
/// The role gates two behaviours: only always-on nodes answer sync requests
/// (so battery nodes are never woken to serve the swarm), and only always-on
/// nodes open the manual provisioning portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeRole {
    BatteryPowered,
    AlwaysOn,
}

impl NodeRole {
    pub fn is_battery_powered(self) -> bool {
        matches!(self, NodeRole::BatteryPowered)
    }

    /// Whether this node replies to `SYNC_REQ` on behalf of the swarm.
    pub fn answers_sync_requests(self) -> bool {
        matches!(self, NodeRole::AlwaysOn)
    }

    /// Whether this node may open the captive provisioning portal.
    pub fn may_provision(self) -> bool {
        matches!(self, NodeRole::AlwaysOn)
    }

    /// Whether this node enters deep sleep once it is online.
    pub fn sleeps(self) -> bool {
        self.is_battery_powered()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeRole::BatteryPowered => "battery-powered",
            NodeRole::AlwaysOn => "always-on",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "battery-powered" | "battery" => Ok(NodeRole::BatteryPowered),
            "always-on" | "mains" | "anchor" => Ok(NodeRole::AlwaysOn),
            other => Err(format!(
                "unknown node role '{other}' (expected 'battery-powered' or 'always-on')"
            )),
        }
    }
}
