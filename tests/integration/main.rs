//! Integration tests for agentcache

mod cache_flow {
    use agentcache::cache::Downloader;
    use agentcache::config::{Config, ConfigManager};
    use agentcache::error::CacheError;
    use agentcache::fetch::{FetchError, FetchResponse, RemoteFetch};
    use agentcache::metadata::{MetadataError, RegionProvider};
    use sha2::{Digest, Sha256};
    use std::collections::HashMap;
    use std::io::{Cursor, Read};
    use tempfile::TempDir;

    fn init_logging() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }

    struct ObjectStore {
        objects: HashMap<String, (u16, Vec<u8>)>,
    }

    impl ObjectStore {
        fn new() -> Self {
            Self {
                objects: HashMap::new(),
            }
        }

        fn put(&mut self, url: &str, status: u16, body: impl Into<Vec<u8>>) {
            self.objects.insert(url.to_string(), (status, body.into()));
        }

        /// Publish an artifact and its checksum manifest for a region
        fn publish(&mut self, config: &Config, region: &str, artifact: &[u8]) {
            let mut hasher = Sha256::new();
            hasher.update(artifact);
            let manifest = format!("{}\n", hex::encode(hasher.finalize()));
            self.put(&config.remote_tarball_url(region), 200, artifact);
            self.put(&config.remote_checksum_url(region), 200, manifest);
        }
    }

    impl RemoteFetch for ObjectStore {
        fn get(&self, url: &str) -> Result<FetchResponse, FetchError> {
            match self.objects.get(url) {
                Some((status, bytes)) => Ok(FetchResponse {
                    status: *status,
                    body: Box::new(Cursor::new(bytes.clone())),
                }),
                None => Err(FetchError::new(url, "no route to host")),
            }
        }
    }

    struct Unreachable;

    impl RegionProvider for Unreachable {
        fn region(&self) -> Result<String, MetadataError> {
            Err(MetadataError("request timed out".to_string()))
        }
    }

    fn config_in(temp: &TempDir) -> Config {
        let mut config = Config::default();
        config.cache.directory = temp.path().join("cache");
        config.remote.tarball_url_template =
            "https://releases.example/{region}/agent-latest.tar".to_string();
        config
    }

    fn read_all(mut stream: std::fs::File) -> Vec<u8> {
        let mut contents = Vec::new();
        stream.read_to_end(&mut contents).unwrap();
        contents
    }

    #[test]
    fn fresh_host_bootstrap_flow() {
        init_logging();
        let temp = TempDir::new().unwrap();

        // Config round-trips through the manager like a real deployment
        let manager = ConfigManager::with_path(temp.path().join("config.toml"));
        manager.save(&config_in(&temp)).unwrap();
        let config = manager.load().unwrap();

        let artifact = b"agent image payload";
        let mut store = ObjectStore::new();
        store.publish(&config, &config.remote.default_region, artifact);

        let dl: Downloader<ObjectStore, Unreachable> =
            Downloader::with_capabilities(config, store, None);

        assert!(!dl.is_agent_cached());
        dl.download_agent().unwrap();

        // Download alone does not mark the cache; that is the caller's call
        assert!(!dl.is_agent_cached());
        dl.record_cached_agent().unwrap();
        assert!(dl.is_agent_cached());

        assert_eq!(read_all(dl.load_cached_agent().unwrap()), artifact);
    }

    #[test]
    fn cached_agent_survives_without_network() {
        init_logging();
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);

        let artifact = b"agent image payload";
        let mut store = ObjectStore::new();
        store.publish(&config, &config.remote.default_region, artifact);

        let dl: Downloader<ObjectStore, Unreachable> =
            Downloader::with_capabilities(config.clone(), store, None);
        dl.download_agent().unwrap();
        dl.record_cached_agent().unwrap();

        // Same cache, no reachable object store
        let offline: Downloader<ObjectStore, Unreachable> =
            Downloader::with_capabilities(config, ObjectStore::new(), None);
        assert!(offline.is_agent_cached());
        assert_eq!(read_all(offline.load_cached_agent().unwrap()), artifact);
    }

    #[test]
    fn tampered_download_leaves_cache_usable() {
        init_logging();
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);
        let region = config.remote.default_region.clone();

        let good = b"agent v1";
        let mut store = ObjectStore::new();
        store.publish(&config, &region, good);

        let dl: Downloader<ObjectStore, Unreachable> =
            Downloader::with_capabilities(config.clone(), store, None);
        dl.download_agent().unwrap();
        dl.record_cached_agent().unwrap();

        // Second download serves tampered bytes under the old manifest
        let mut hasher = Sha256::new();
        hasher.update(good);
        let manifest = format!("{}\n", hex::encode(hasher.finalize()));
        let mut tampered = ObjectStore::new();
        tampered.put(&config.remote_tarball_url(&region), 200, &b"agent evil"[..]);
        tampered.put(&config.remote_checksum_url(&region), 200, manifest);

        let dl: Downloader<ObjectStore, Unreachable> =
            Downloader::with_capabilities(config.clone(), tampered, None);
        let err = dl.download_agent().unwrap_err();
        assert!(matches!(err, CacheError::ChecksumMismatch { .. }));
        assert!(err.is_integrity_failure());

        // The previously verified artifact still loads
        assert!(dl.is_agent_cached());
        assert_eq!(read_all(dl.load_cached_agent().unwrap()), good);
    }

    #[test]
    fn desired_image_override() {
        init_logging();
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);

        let artifact = b"agent latest";
        let mut store = ObjectStore::new();
        store.publish(&config, &config.remote.default_region, artifact);

        let dl: Downloader<ObjectStore, Unreachable> =
            Downloader::with_capabilities(config.clone(), store, None);
        dl.download_agent().unwrap();

        // Operator pins a different image by dropping it in the cache dir
        std::fs::write(config.cache.directory.join("agent-pinned.tar"), b"agent pinned").unwrap();
        std::fs::write(config.desired_image_locator(), "agent-pinned.tar\n").unwrap();

        assert_eq!(read_all(dl.load_desired_agent().unwrap()), b"agent pinned");
        // The canonical artifact is unaffected by the indirection
        assert_eq!(read_all(dl.load_cached_agent().unwrap()), artifact);
    }

    #[test]
    fn metadata_outage_falls_back_to_default_region() {
        init_logging();
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);

        let artifact = b"agent image payload";
        let mut store = ObjectStore::new();
        store.publish(&config, &config.remote.default_region, artifact);

        let dl = Downloader::with_capabilities(config.clone(), store, Some(Unreachable));
        dl.download_agent().unwrap();
        assert_eq!(read_all(dl.load_cached_agent().unwrap()), artifact);
    }
}
