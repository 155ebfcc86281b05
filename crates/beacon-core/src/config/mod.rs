mod admins;
mod defaults;
mod store;
mod user;

#[cfg(test)]
mod tests;

pub use admins::AdminList;
pub use store::ConfigStore;
pub use user::{UserConfig, CONFIG_KEYS};

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::BeaconError;
use defaults::*;

/// Top-level Beacon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub media: MediaConfig,
}

/// General bot identity and paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_owner")]
    pub owner: String,
    /// Shown by the `repo` command.
    #[serde(default = "default_repo_url")]
    pub repo_url: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            owner: default_owner(),
            repo_url: default_repo_url(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Session manager and dispatcher tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Phone numbers to connect on `start`.
    #[serde(default)]
    pub numbers: Vec<String>,
    /// Credential fetch and reconnect attempts.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Linear backoff unit: retry `n` waits `n * base_delay_ms`.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_status_cooldown_secs")]
    pub status_cooldown_secs: u64,
    #[serde(default = "default_command_cooldown_ms")]
    pub command_cooldown_ms: u64,
    /// Senders tracked by the command cooldown before LRU eviction.
    #[serde(default = "default_cooldown_capacity")]
    pub cooldown_capacity: usize,
    /// Capacity of each session's inbound event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            numbers: Vec::new(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            status_cooldown_secs: default_status_cooldown_secs(),
            command_cooldown_ms: default_command_cooldown_ms(),
            cooldown_capacity: default_cooldown_capacity(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl SessionsConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn status_cooldown(&self) -> Duration {
        Duration::from_secs(self.status_cooldown_secs)
    }

    pub fn command_cooldown(&self) -> Duration {
        Duration::from_millis(self.command_cooldown_ms)
    }
}

/// Local persistence paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one `<number>.json` per session.
    #[serde(default = "default_config_dir")]
    pub config_dir: String,
    /// JSON array of admin phone numbers.
    #[serde(default = "default_admin_file")]
    pub admin_file: String,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// SQLite database shared by every WhatsApp session.
    #[serde(default = "default_session_db")]
    pub session_db: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            admin_file: default_admin_file(),
            cache_ttl_secs: default_cache_ttl_secs(),
            session_db: default_session_db(),
        }
    }
}

impl StorageConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// GitHub-backed credential archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub repo: String,
    /// Access token. Empty disables every archive operation.
    #[serde(default)]
    pub token: String,
    /// Directory inside the repository holding `creds_*.json` files.
    #[serde(default = "default_archive_path")]
    pub path: String,
    #[serde(default = "default_archive_branch")]
    pub branch: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            token: String::new(),
            path: default_archive_path(),
            branch: default_archive_branch(),
        }
    }
}

impl ArchiveConfig {
    /// Archive operations run only with a token and a target repository.
    pub fn is_enabled(&self) -> bool {
        !self.token.is_empty() && !self.owner.is_empty() && !self.repo.is_empty()
    }
}

/// External download API used by media commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default = "default_media_api_base")]
    pub api_base: String,
    #[serde(default = "default_media_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            api_base: default_media_api_base(),
            timeout_secs: default_media_timeout_secs(),
        }
    }
}

impl Config {
    /// Override archive settings from `GITHUB_TOKEN`, `GITHUB_REPO_OWNER`
    /// and `GITHUB_REPO_NAME` when set.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(token) = non_empty("GITHUB_TOKEN") {
            self.archive.token = token;
        }
        if let Some(owner) = non_empty("GITHUB_REPO_OWNER") {
            self.archive.owner = owner;
        }
        if let Some(repo) = non_empty("GITHUB_REPO_NAME") {
            self.archive.repo = repo;
        }
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file, then apply environment overrides.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<Config, BeaconError> {
    let path = Path::new(path);
    let mut config = if !path.exists() {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        Config::default()
    } else {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BeaconError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| BeaconError::Config(format!("failed to parse config: {}", e)))?
    };

    config.apply_env();
    Ok(config)
}
