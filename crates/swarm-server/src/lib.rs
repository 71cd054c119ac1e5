//! # swarm-server
//!
//! HTTP surfaces of a swarm node:
//!
//! - **Admin**: status page, Wi-Fi scan, network list, add/delete, find-me
//!   blink, reboot and a JSON status endpoint. Opened on demand by the runtime.
//! - **Portal**: the captive provisioning form used when a node has no
//!   working network at all.

pub mod admin;
pub mod pages;
pub mod portal;
pub mod qr;

pub use admin::{AdminServer, build_router};
pub use portal::{CaptivePortal, portal_router};
