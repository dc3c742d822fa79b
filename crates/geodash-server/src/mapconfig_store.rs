//! On-disk registry of compiled map configurations.
//!
//! Each `<token>.json` file in the configured directory holds one compiled
//! map configuration; the file stem is the layergroup token used in URLs.

use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use geodash_core::{DataviewError, MapConfig};
use geodash_dataviews::MapConfigProvider;

#[derive(Debug, thiserror::Error)]
pub enum MapConfigStoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid map configuration {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Map configurations keyed by token.
#[derive(Debug, Clone, Default)]
pub struct MapConfigStore {
    configs: Arc<DashMap<String, Arc<MapConfig>>>,
}

impl MapConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` file of `dir`. A missing directory yields an empty store.
    pub fn load_dir(dir: &Path) -> Result<Self, MapConfigStoreError> {
        let store = Self::new();
        if !dir.exists() {
            warn!(dir = %dir.display(), "map configuration directory not found");
            return Ok(store);
        }

        let io_err = |source: std::io::Error| MapConfigStoreError::Io {
            path: dir.to_path_buf(),
            source,
        };
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(token) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            let raw = std::fs::read_to_string(&path).map_err(|source| MapConfigStoreError::Io {
                path: path.clone(),
                source,
            })?;
            let config = MapConfig::from_json(&raw)
                .map_err(|source| MapConfigStoreError::Parse { path: path.clone(), source })?;
            debug!(token = %token, dataviews = config.dataviews.len(), "map configuration loaded");
            store.insert(token, config);
        }

        info!(dir = %dir.display(), count = store.len(), "map configurations loaded");
        Ok(store)
    }

    pub fn insert(&self, token: impl Into<String>, config: MapConfig) {
        self.configs.insert(token.into(), Arc::new(config));
    }

    pub fn get(&self, token: &str) -> Option<Arc<MapConfig>> {
        self.configs.get(token).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Provider resolving `token` against this store at request time.
    pub fn provider(&self, token: &str) -> TokenProvider {
        TokenProvider {
            store: self.clone(),
            token: token.to_string(),
        }
    }
}

/// [`MapConfigProvider`] for one layergroup token.
#[derive(Debug, Clone)]
pub struct TokenProvider {
    store: MapConfigStore,
    token: String,
}

#[async_trait]
impl MapConfigProvider for TokenProvider {
    async fn get_map_config(&self) -> geodash_core::Result<Arc<MapConfig>> {
        self.store
            .get(&self.token)
            .ok_or_else(|| DataviewError::map_config_not_found(&self.token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const CONFIG: &str = r#"{ "layers": [], "dataviews": {} }"#;

    #[test]
    fn test_load_dir_keys_by_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("abc123.json"), CONFIG).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let store = MapConfigStore::load_dir(dir.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.get("abc123").is_some());
        assert!(store.get("notes").is_none());
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = MapConfigStore::load_dir(&dir.path().join("nope")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_malformed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), "{").unwrap();
        let err = MapConfigStore::load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, MapConfigStoreError::Parse { .. }));
        assert!(err.to_string().contains("broken.json"));
    }

    #[tokio::test]
    async fn test_unknown_token_is_not_found() {
        let store = MapConfigStore::new();
        let err = store.provider("missing").get_map_config().await.unwrap_err();
        assert_eq!(err.http_status(), 404);
    }
}
