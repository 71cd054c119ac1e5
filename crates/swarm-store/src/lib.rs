//! # swarm-store
//!
//! The single replicated document of the swarm: a version counter plus the
//! list of known Wi-Fi credentials.
//!
//! - **ConfigDocument**: the persisted/wire shape
//! - **FileStore**: durable storage collaborator (disk or in-memory)
//! - **ConfigStore**: exclusive owner of the document: upsert, remove, merge

pub mod document;
pub mod fs;
pub mod store;

pub use document::{ConfigDocument, Credential};
pub use fs::{DiskFileStore, FileStore, MemoryFileStore};
pub use store::ConfigStore;
