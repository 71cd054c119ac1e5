//! # swarm-runtime
//!
//! Keeps a swarm node connected. [`BootstrapPolicy`] runs the startup
//! fallback chain; [`NodeRuntime`] owns the node afterwards and drives the
//! mesh, the admin queue, reconnects and deep sleep from one poll loop.
//!
//! Hardware and UI sit behind collaborator traits ([`StationDriver`],
//! [`ProvisioningPortal`], [`DeviceControl`], [`AdminSurface`]); [`mock`]
//! has scriptable versions of each.

pub mod admin;
pub mod bootstrap;
pub mod device;
pub mod mock;
pub mod portal;
pub mod runtime;
pub mod station;

pub use admin::{AdminCommand, AdminHandle, AdminSurface, StatusReport};
pub use bootstrap::{BootstrapContext, BootstrapOutcome, BootstrapPolicy};
pub use device::{DeviceControl, HostDevice, TriggerHandle};
pub use portal::{PortalOutcome, ProvisioningPortal};
pub use runtime::{Collaborators, NodeRuntime, RunExit, RuntimeSettings, RuntimeState};
pub use station::{
    ConnectOutcome, NmcliStation, OfflineStation, ScanEntry, Station, StationDriver,
    StationStatus, select_candidates,
};
