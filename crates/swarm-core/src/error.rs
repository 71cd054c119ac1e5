use thiserror::Error;

/// Unified error type for the swarm runtime.
#[derive(Error, Debug)]
pub enum SwarmError {
    // ── Store errors ───────────────────────────────────────────
    #[error("storage error: {0}")]
    Storage(String),

    #[error("network index {index} out of bounds ({len} stored)")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    // ── Mesh / networking errors ───────────────────────────────
    #[error("mesh transport error: {0}")]
    Transport(String),

    #[error("mesh peer unreachable: {0}")]
    PeerUnreachable(String),

    // ── Collaborator errors ────────────────────────────────────
    #[error("station driver error: {0}")]
    Station(String),

    #[error("provisioning portal error: {0}")]
    Portal(String),

    #[error("admin server error: {0}")]
    Server(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SwarmError>;
