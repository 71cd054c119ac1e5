#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use swarm_core::SwarmError;
    use swarm_store::*;

    fn doc_path() -> PathBuf {
        PathBuf::from("/networks.json")
    }

    fn memory_store() -> (ConfigStore, MemoryFileStore) {
        let files = MemoryFileStore::new();
        let store = ConfigStore::open(Arc::new(files.clone()), doc_path());
        (store, files)
    }

    fn doc(version: u32, nets: &[(&str, &str)]) -> ConfigDocument {
        ConfigDocument {
            version,
            networks: nets.iter().map(|(s, p)| Credential::new(*s, *p)).collect(),
        }
    }

    // ── Load ───────────────────────────────────────────────────

    #[test]
    fn test_fresh_device_loads_zero_document() {
        let (store, _) = memory_store();
        let loaded = store.load();
        assert_eq!(loaded.version, 0);
        assert!(loaded.networks.is_empty());
        assert_eq!(store.current_version(), 0);
    }

    #[test]
    fn test_corrupt_file_degrades_to_zero_document() {
        let files = MemoryFileStore::new();
        files.put(doc_path(), b"{not json".to_vec());
        let store = ConfigStore::open(Arc::new(files), doc_path());
        assert_eq!(store.document(), &ConfigDocument::default());
    }

    #[test]
    fn test_existing_file_is_loaded() {
        let files = MemoryFileStore::new();
        files.put(
            doc_path(),
            br#"{"version":3,"networks":[{"ssid":"X","pass":"a"}]}"#.to_vec(),
        );
        let store = ConfigStore::open(Arc::new(files), doc_path());
        assert_eq!(store.document(), &doc(3, &[("X", "a")]));
    }

    // ── Upsert / remove ────────────────────────────────────────

    #[test]
    fn test_version_counts_successful_mutations() {
        let (mut store, _) = memory_store();
        store.upsert("a", "1").unwrap();
        store.upsert("b", "2").unwrap();
        store.upsert("a", "3").unwrap();
        store.remove(1).unwrap();
        assert!(store.remove(5).is_err());
        assert!(store.upsert("", "x").is_err());
        assert_eq!(store.current_version(), 4);
    }

    #[test]
    fn test_upsert_same_ssid_keeps_one_entry() {
        let (mut store, _) = memory_store();
        store.upsert("home", "p1").unwrap();
        let result = store.upsert("home", "p2").unwrap();
        assert_eq!(result.networks, vec![Credential::new("home", "p2")]);
        assert_eq!(result.version, 2);
    }

    #[test]
    fn test_upsert_preserves_position_of_existing_entry() {
        let (mut store, _) = memory_store();
        store.upsert("a", "1").unwrap();
        store.upsert("b", "2").unwrap();
        store.upsert("a", "9").unwrap();
        let ssids: Vec<_> = store.document().networks.iter().map(|c| c.ssid.as_str()).collect();
        assert_eq!(ssids, vec!["a", "b"]);
    }

    #[test]
    fn test_remove_out_of_bounds_is_noop() {
        let (mut store, _) = memory_store();
        store.upsert("a", "1").unwrap();
        let before = store.document().clone();
        let err = store.remove(1).unwrap_err();
        assert!(matches!(err, SwarmError::IndexOutOfBounds { index: 1, len: 1 }));
        assert_eq!(store.document(), &before);
        assert_eq!(store.load(), before);
    }

    #[test]
    fn test_remove_by_index() {
        let (mut store, _) = memory_store();
        store.upsert("a", "1").unwrap();
        store.upsert("b", "2").unwrap();
        let result = store.remove(0).unwrap();
        assert_eq!(result, doc(3, &[("b", "2")]));
    }

    #[test]
    fn test_write_failure_discards_mutation() {
        let (mut store, files) = memory_store();
        store.upsert("a", "1").unwrap();
        files.set_fail_writes(true);
        assert!(matches!(store.upsert("b", "2"), Err(SwarmError::Storage(_))));
        assert!(store.remove(0).is_err());
        assert_eq!(store.document(), &doc(1, &[("a", "1")]));
        assert_eq!(store.load(), doc(1, &[("a", "1")]));

        files.set_fail_writes(false);
        assert_eq!(store.upsert("b", "2").unwrap().version, 2);
    }

    // ── Merge ──────────────────────────────────────────────────

    #[test]
    fn test_merge_newer_replaces_wholesale() {
        let files = MemoryFileStore::new();
        files.put(
            doc_path(),
            br#"{"version":3,"networks":[{"ssid":"X","pass":"a"}]}"#.to_vec(),
        );
        let mut store = ConfigStore::open(Arc::new(files), doc_path());
        let adopted = store.merge(doc(5, &[("Y", "b")])).unwrap();
        assert!(adopted);
        assert_eq!(store.load().version, 5);
        assert_eq!(store.load().networks, vec![Credential::new("Y", "b")]);
    }

    #[test]
    fn test_merge_stale_or_equal_is_noop() {
        let (mut store, _) = memory_store();
        store.upsert("a", "1").unwrap();
        store.upsert("b", "2").unwrap();
        let before = store.document().clone();
        assert!(!store.merge(doc(1, &[("z", "z")])).unwrap());
        assert!(!store.merge(doc(2, &[("z", "z")])).unwrap());
        assert_eq!(store.document(), &before);
    }

    #[test]
    fn test_merge_duplicate_delivery_is_idempotent() {
        let (mut store, _) = memory_store();
        let remote = doc(7, &[("Y", "b")]);
        assert!(store.merge(remote.clone()).unwrap());
        assert!(!store.merge(remote.clone()).unwrap());
        assert_eq!(store.document(), &remote);
    }

    #[test]
    fn test_merge_out_of_order_keeps_highest() {
        let (mut store, _) = memory_store();
        store.merge(doc(4, &[("four", "")])).unwrap();
        store.merge(doc(9, &[("nine", "")])).unwrap();
        store.merge(doc(6, &[("six", "")])).unwrap();
        assert_eq!(store.current_version(), 9);
        assert_eq!(store.document().networks[0].ssid, "nine");
    }

    #[test]
    fn test_merge_write_failure_not_adopted() {
        let (mut store, files) = memory_store();
        files.set_fail_writes(true);
        assert!(store.merge(doc(3, &[("Y", "b")])).is_err());
        assert_eq!(store.current_version(), 0);
    }

    #[test]
    fn test_export_auth_candidates_follows_document() {
        let (mut store, _) = memory_store();
        store.upsert("a", "1").unwrap();
        store.merge(doc(10, &[("Y", "b"), ("Z", "c")])).unwrap();
        let candidates = store.export_auth_candidates();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1], Credential::new("Z", "c"));
    }

    // ── Disk ───────────────────────────────────────────────────

    #[test]
    fn test_disk_round_trip_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("networks.json");
        {
            let mut store = ConfigStore::open(Arc::new(DiskFileStore::new()), &path);
            store.upsert("c", "3").unwrap();
            store.upsert("a", "1").unwrap();
            store.upsert("b", "2").unwrap();
        }
        let reopened = ConfigStore::open(Arc::new(DiskFileStore::new()), &path);
        assert_eq!(reopened.document(), &doc(3, &[("c", "3"), ("a", "1"), ("b", "2")]));
    }

    #[test]
    fn test_disk_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("networks.json");
        let mut store = ConfigStore::open(Arc::new(DiskFileStore::new()), &path);
        store.upsert("home", "secret").unwrap();
        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(
            raw,
            serde_json::json!({"version": 1, "networks": [{"ssid": "home", "pass": "secret"}]})
        );
        assert!(DiskFileStore::new().exists(Path::new(&path)));
    }
}
