//! Default value functions used by serde for config deserialization.

pub fn default_name() -> String {
    "Beacon".to_string()
}

pub fn default_owner() -> String {
    "Beacon Team".to_string()
}

pub fn default_repo_url() -> String {
    "https://github.com/beacon-bot/beacon".to_string()
}

pub fn default_data_dir() -> String {
    "~/.beacon".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_max_retries() -> u32 {
    3
}

pub fn default_base_delay_ms() -> u64 {
    1000
}

pub fn default_status_cooldown_secs() -> u64 {
    10
}

pub fn default_command_cooldown_ms() -> u64 {
    1000
}

pub fn default_cooldown_capacity() -> usize {
    1024
}

pub fn default_event_buffer() -> usize {
    64
}

pub fn default_config_dir() -> String {
    "~/.beacon/configs".to_string()
}

pub fn default_admin_file() -> String {
    "~/.beacon/admin.json".to_string()
}

pub fn default_session_db() -> String {
    "~/.beacon/data/sessions.db".to_string()
}

pub fn default_cache_ttl_secs() -> u64 {
    300
}

pub fn default_archive_path() -> String {
    "session".to_string()
}

pub fn default_archive_branch() -> String {
    "main".to_string()
}

pub fn default_media_api_base() -> String {
    "https://api.beacon-bot.dev".to_string()
}

pub fn default_media_timeout_secs() -> u64 {
    60
}

pub fn default_prefix() -> String {
    ".".to_string()
}

pub fn default_like_emojis() -> Vec<String> {
    ["💗", "🔥", "😍", "👍", "💯", "🥰", "😂", "😮"]
        .iter()
        .map(|e| e.to_string())
        .collect()
}
