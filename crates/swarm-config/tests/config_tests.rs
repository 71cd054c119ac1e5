#[cfg(test)]
mod tests {
    use swarm_config::ConfigLoader;
    use swarm_config::schema::*;
    use swarm_core::NodeRole;
    use std::io::Write;

    // ── Default tests ──────────────────────────────────────────

    #[test]
    fn test_swarm_config_defaults() {
        let config = SwarmConfig::default();
        assert_eq!(config.node.role, NodeRole::AlwaysOn);
        assert_eq!(config.node.document_file, "networks.json");
        assert_eq!(config.mesh.topic, "ESP32_SWARM_NET");
        assert!(config.mesh.enabled);
    }

    #[test]
    fn test_timing_defaults() {
        let config = SwarmConfig::default();
        assert_eq!(config.sync.window_secs, 15);
        assert_eq!(config.sync.resend_secs, 3);
        assert_eq!(config.portal.timeout_secs, 180);
        assert_eq!(config.admin.idle_timeout_secs, 300);
        assert_eq!(config.runtime.reconnect_interval_secs, 60);
        assert_eq!(config.runtime.deep_sleep_secs, 600);
        assert_eq!(config.runtime.max_awake_secs, 60);
    }

    #[test]
    fn test_bootstrap_default_order() {
        let config = BootstrapConfig::default();
        assert_eq!(
            config.stages,
            vec![
                BootstrapStage::KnownNetworks,
                BootstrapStage::MeshSync,
                BootstrapStage::Provisioning
            ]
        );
    }

    #[test]
    fn test_document_path_joins_data_dir() {
        let mut config = SwarmConfig::default();
        config.node.data_dir = "/var/lib/swarm".into();
        assert_eq!(
            config.document_path(),
            std::path::PathBuf::from("/var/lib/swarm/networks.json")
        );
    }

    // ── TOML tests ─────────────────────────────────────────────

    #[test]
    fn test_config_toml_roundtrip() {
        let config = SwarmConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let restored: SwarmConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(restored.node.role, config.node.role);
        assert_eq!(restored.bootstrap.stages, config.bootstrap.stages);
        assert_eq!(restored.admin.listen, config.admin.listen);
    }

    #[test]
    fn test_partial_toml_applies_defaults() {
        let toml_str = r#"
[node]
role = "battery-powered"

[bootstrap]
stages = ["mesh-sync", "known-networks"]
"#;
        let config: SwarmConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.node.role, NodeRole::BatteryPowered);
        assert_eq!(
            config.bootstrap.stages,
            vec![BootstrapStage::MeshSync, BootstrapStage::KnownNetworks]
        );
        // Defaults should fill in
        assert_eq!(config.bootstrap.connect_timeout_secs, 10);
        assert_eq!(config.sync.window_secs, 15);
        assert_eq!(config.station.backend, StationBackend::Nmcli);
    }

    #[test]
    fn test_unknown_stage_rejected() {
        let toml_str = r#"
[bootstrap]
stages = ["known-networks", "carrier-pigeon"]
"#;
        assert!(toml::from_str::<SwarmConfig>(toml_str).is_err());
    }

    // ── Validation tests ───────────────────────────────────────

    #[test]
    fn test_default_config_validates() {
        let warnings = SwarmConfig::default().validate().unwrap();
        assert!(warnings.iter().all(|w| w.severity != WarningSeverity::Error));
    }

    #[test]
    fn test_empty_stages_is_error() {
        let mut config = SwarmConfig::default();
        config.bootstrap.stages.clear();
        let err = config.validate().unwrap_err();
        assert!(err.contains("bootstrap.stages"));
    }

    #[test]
    fn test_resend_not_shorter_than_window_is_error() {
        let mut config = SwarmConfig::default();
        config.sync.window_secs = 3;
        config.sync.resend_secs = 3;
        let err = config.validate().unwrap_err();
        assert!(err.contains("sync.resend_secs"));
    }

    #[test]
    fn test_battery_with_provisioning_warns() {
        let mut config = SwarmConfig::default();
        config.node.role = NodeRole::BatteryPowered;
        let warnings = config.validate().unwrap();
        assert!(warnings.iter().any(|w| w.field == "bootstrap.stages"
            && w.severity == WarningSeverity::Warning));
    }

    #[test]
    fn test_battery_awake_window_shorter_than_sync_warns() {
        let mut config = SwarmConfig::default();
        config.node.role = NodeRole::BatteryPowered;
        config.runtime.max_awake_secs = 10;
        let warnings = config.validate().unwrap();
        assert!(warnings.iter().any(|w| w.field == "runtime.max_awake_secs"
            && w.severity == WarningSeverity::Warning));

        config.runtime.max_awake_secs = 60;
        let warnings = config.validate().unwrap();
        assert!(!warnings.iter().any(|w| w.field == "runtime.max_awake_secs"));
    }

    // ── Loader tests ───────────────────────────────────────────

    #[test]
    fn test_loader_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[admin]
listen = "127.0.0.1:9000"

[sync]
window_secs = 10
"#
        )
        .unwrap();
        let loader = ConfigLoader::load(Some(file.path())).unwrap();
        let config = loader.get();
        assert_eq!(config.admin.listen, "127.0.0.1:9000");
        assert_eq!(config.sync.window_secs, 10);
        assert_eq!(loader.path(), file.path());
    }

    #[test]
    fn test_loader_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(loader.get().sync.window_secs, 15);
    }

    #[test]
    fn test_loader_rejects_invalid_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sync]\nwindow_secs = 0").unwrap();
        assert!(ConfigLoader::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_loader_rejects_malformed_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[node\nrole = ").unwrap();
        assert!(ConfigLoader::load(Some(file.path())).is_err());
    }
}
