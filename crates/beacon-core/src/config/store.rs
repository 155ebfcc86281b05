//! Per-number config files with a TTL read cache.

use moka::sync::Cache;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use super::user::UserConfig;
use crate::error::BeaconError;
use crate::message::normalize_number;

/// Loads and saves `<dir>/<number>.json`, merging file overrides onto defaults.
pub struct ConfigStore {
    dir: PathBuf,
    defaults: UserConfig,
    cache: Cache<String, UserConfig>,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>, defaults: UserConfig, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            defaults,
            cache: Cache::builder().time_to_live(ttl).build(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, number: &str) -> PathBuf {
        self.dir.join(format!("{}.json", normalize_number(number)))
    }

    /// Config for `number`: cached copy if fresh, else file merged onto defaults.
    /// A missing file yields the defaults.
    pub async fn load(&self, number: &str) -> Result<UserConfig, BeaconError> {
        let key = normalize_number(number);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let config = self.read_file(&key).await?;
        self.cache.insert(key, config.clone());
        Ok(config)
    }

    /// Persist the full config and refresh the cache.
    pub async fn save(&self, number: &str, config: &UserConfig) -> Result<(), BeaconError> {
        let key = normalize_number(number);
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(&key);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(config)?;
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(number = %key, "saved config to {}", path.display());
        self.cache.insert(key, config.clone());
        Ok(())
    }

    /// Apply one `KEY VALUE` update and persist it. Returns the new config.
    pub async fn set(
        &self,
        number: &str,
        key: &str,
        value: &str,
    ) -> Result<UserConfig, BeaconError> {
        // Re-read from disk so an edit never lands on a stale cached copy.
        let mut config = self.read_file(&normalize_number(number)).await?;
        config.set(key, value)?;
        self.save(number, &config).await?;
        Ok(config)
    }

    pub fn invalidate(&self, number: &str) {
        self.cache.invalidate(&normalize_number(number));
    }

    async fn read_file(&self, number: &str) -> Result<UserConfig, BeaconError> {
        let path = self.path_for(number);
        let overrides = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str::<Value>(&content).map_err(|e| {
                BeaconError::Config(format!("invalid config {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(self.defaults.clone());
            }
            Err(e) => return Err(e.into()),
        };

        let mut merged = serde_json::to_value(&self.defaults)?;
        match (merged.as_object_mut(), overrides) {
            (Some(base), Value::Object(over)) => {
                for (k, v) in over {
                    base.insert(k, v);
                }
            }
            (_, other) => {
                warn!(
                    "config {} is not a JSON object ({}), using defaults",
                    path.display(),
                    other
                );
                return Ok(self.defaults.clone());
            }
        }

        Ok(serde_json::from_value(merged)?)
    }
}
