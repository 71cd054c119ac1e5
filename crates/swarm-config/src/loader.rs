use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::schema::SwarmConfig;
use swarm_core::SwarmError;

/// Loads the swarm node configuration.
pub struct ConfigLoader {
    config: SwarmConfig,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > SWARM_CONFIG env > ~/.swarm/swarm.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("SWARM_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".swarm")
            .join("swarm.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> swarm_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            Self::parse(&raw, &config_path)?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            SwarmConfig::default()
        };

        let config = Self::apply_env_overrides(config)?;

        // Log warnings, fail on errors
        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => {
                return Err(SwarmError::Config(e));
            }
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    fn parse(raw: &str, path: &Path) -> swarm_core::Result<SwarmConfig> {
        toml::from_str::<SwarmConfig>(raw).map_err(|e| {
            SwarmError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Get a snapshot of the loaded config.
    pub fn get(&self) -> SwarmConfig {
        self.config.clone()
    }

    /// Path the config was (or would have been) read from.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env var overrides (SWARM_ROLE, SWARM_LOG_LEVEL, etc.)
    fn apply_env_overrides(mut config: SwarmConfig) -> swarm_core::Result<SwarmConfig> {
        if let Ok(v) = std::env::var("SWARM_ROLE") {
            config.node.role = v.parse().map_err(|reason| SwarmError::ConfigValidation {
                field: "SWARM_ROLE".into(),
                reason,
            })?;
        }
        if let Ok(v) = std::env::var("SWARM_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = std::env::var("SWARM_ADMIN_LISTEN") {
            config.admin.listen = v;
        }
        if let Ok(v) = std::env::var("SWARM_MESH_LISTEN") {
            config.mesh.listen = v;
        }
        Ok(config)
    }
}
