use async_trait::async_trait;
use std::time::Duration;

use swarm_core::Result;
use swarm_store::Credential;

/// How a provisioning session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalOutcome {
    /// An operator submitted a credential.
    Provisioned(Credential),
    /// Nobody submitted anything before the timeout.
    TimedOut,
}

/// Manual provisioning flow (captive portal or equivalent).
///
/// `provision` opens the flow, waits at most `timeout` for an operator, and
/// always closes it again before returning.
#[async_trait]
pub trait ProvisioningPortal: Send {
    async fn provision(&mut self, timeout: Duration) -> Result<PortalOutcome>;
}
