use super::*;
use std::sync::atomic::{AtomicU64, Ordering};

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Fresh scratch directory, unique per call.
fn scratch_dir(tag: &str) -> std::path::PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "__beacon_cfg_{tag}_{}_{}__",
        std::process::id(),
        id
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_defaults_when_sections_missing() {
    let cfg: Config = toml::from_str("").unwrap();
    assert_eq!(cfg.sessions.max_retries, 3);
    assert_eq!(cfg.sessions.status_cooldown_secs, 10);
    assert_eq!(cfg.sessions.command_cooldown_ms, 1000);
    assert_eq!(cfg.storage.cache_ttl_secs, 300);
    assert_eq!(cfg.archive.path, "session");
    assert!(!cfg.archive.is_enabled());
}

#[test]
fn test_parse_full_config() {
    let toml_str = r#"
        [bot]
        name = "Status Bot"

        [sessions]
        numbers = ["94771234567", "15551234567"]
        max_retries = 5
        base_delay_ms = 250

        [archive]
        owner = "me"
        repo = "sessions"
        token = "ghp_x"
    "#;
    let cfg: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(cfg.bot.name, "Status Bot");
    assert_eq!(cfg.bot.data_dir, "~/.beacon");
    assert_eq!(cfg.sessions.numbers.len(), 2);
    assert_eq!(cfg.sessions.max_retries, 5);
    assert_eq!(cfg.sessions.base_delay(), Duration::from_millis(250));
    assert!(cfg.archive.is_enabled());
}

#[test]
fn test_env_overrides_archive() {
    let mut cfg = Config::default();
    cfg.apply_env_with(|key| match key {
        "GITHUB_TOKEN" => Some("tok".to_string()),
        "GITHUB_REPO_OWNER" => Some("owner".to_string()),
        "GITHUB_REPO_NAME" => Some("   ".to_string()),
        _ => None,
    });
    assert_eq!(cfg.archive.token, "tok");
    assert_eq!(cfg.archive.owner, "owner");
    assert_eq!(cfg.archive.repo, "", "blank env values are ignored");
    assert!(!cfg.archive.is_enabled());
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let dir = scratch_dir("load");
    let cfg = load(dir.join("nope.toml").to_str().unwrap()).unwrap();
    assert_eq!(cfg.bot.name, "Beacon");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_shellexpand_home() {
    let home = std::env::var("HOME").unwrap_or_default();
    if !home.is_empty() {
        assert_eq!(shellexpand("~/x"), format!("{home}/x"));
    }
    assert_eq!(shellexpand("/abs/path"), "/abs/path");
}

#[test]
fn test_user_config_set_unknown_key_then_view() {
    let mut cfg = UserConfig::default();
    cfg.set("FOO", "bar").unwrap();
    assert!(cfg.render().contains("FOO: bar"));
}

#[test]
fn test_user_config_emoji_list_round_trip() {
    let mut cfg = UserConfig::default();
    cfg.set("auto_like_emoji", "🔥, 💯,,😂").unwrap();
    assert_eq!(cfg.like_emojis, vec!["🔥", "💯", "😂"]);
    assert!(cfg.render().contains("AUTO_LIKE_EMOJI: 🔥,💯,😂"));

    let json = serde_json::to_string(&cfg).unwrap();
    let back: UserConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back.like_emojis, vec!["🔥", "💯", "😂"]);
}

#[test]
fn test_user_config_typed_keys() {
    let mut cfg = UserConfig::default();
    cfg.set("AUTO_RECORDING", "on").unwrap();
    cfg.set("AUTO_VIEW_STATUS", "false").unwrap();
    cfg.set("MAX_RETRIES", "5").unwrap();
    cfg.set("PREFIX", "!").unwrap();
    assert!(cfg.auto_recording);
    assert!(!cfg.auto_view_status);
    assert_eq!(cfg.max_retries, 5);
    assert_eq!(cfg.prefix, "!");

    assert!(cfg.set("AUTO_RECORDING", "maybe").is_err());
    assert!(cfg.set("MAX_RETRIES", "0").is_err());
    assert!(cfg.set("MAX_RETRIES", "lots").is_err());
    assert!(cfg.set("PREFIX", "a b").is_err());
    assert!(cfg.set("PREFIX", "").is_err());
    assert!(cfg.set("AUTO_LIKE_EMOJI", ",,").is_err());
}

#[test]
fn test_user_config_accepts_joined_emoji_string() {
    let cfg: UserConfig =
        serde_json::from_str(r##"{"AUTO_LIKE_EMOJI": "👍,🔥", "PREFIX": "#"}"##).unwrap();
    assert_eq!(cfg.like_emojis, vec!["👍", "🔥"]);
    assert_eq!(cfg.prefix, "#");
    assert!(cfg.auto_view_status, "missing keys take defaults");
}

#[tokio::test]
async fn test_store_missing_file_yields_defaults() {
    let dir = scratch_dir("store_default");
    let store = ConfigStore::new(&dir, UserConfig::default(), Duration::from_secs(300));
    let cfg = store.load("94771234567").await.unwrap();
    assert_eq!(cfg, UserConfig::default());
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_store_set_then_view_round_trip() {
    let dir = scratch_dir("store_set");
    let store = ConfigStore::new(&dir, UserConfig::default(), Duration::from_secs(300));

    store.set("94771234567", "FOO", "bar").await.unwrap();
    store
        .set("94771234567", "AUTO_LIKE_EMOJI", "🔥,💯")
        .await
        .unwrap();

    let cfg = store.load("94771234567").await.unwrap();
    assert!(cfg.render().contains("FOO: bar"));
    assert_eq!(cfg.like_emojis, vec!["🔥", "💯"]);

    // Survives a cold cache (fresh store over the same directory).
    let cold = ConfigStore::new(&dir, UserConfig::default(), Duration::from_secs(300));
    let reloaded = cold.load("+94 77 123 4567").await.unwrap();
    assert_eq!(reloaded, cfg);
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_store_preserves_unknown_keys_on_save() {
    let dir = scratch_dir("store_unknown");
    std::fs::write(
        dir.join("111.json"),
        r#"{"PREFIX": "!", "LEGACY_FLAG": {"nested": true}}"#,
    )
    .unwrap();

    let store = ConfigStore::new(&dir, UserConfig::default(), Duration::from_secs(300));
    store.set("111", "AUTO_RECORDING", "true").await.unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.join("111.json")).unwrap()).unwrap();
    assert_eq!(raw["PREFIX"], "!");
    assert_eq!(raw["AUTO_RECORDING"], true);
    assert_eq!(raw["LEGACY_FLAG"]["nested"], true);
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_store_cache_hides_external_edits_until_invalidated() {
    let dir = scratch_dir("store_cache");
    let store = ConfigStore::new(&dir, UserConfig::default(), Duration::from_secs(300));
    assert_eq!(store.load("222").await.unwrap().prefix, ".");

    std::fs::write(dir.join("222.json"), r#"{"PREFIX": "/"}"#).unwrap();
    assert_eq!(store.load("222").await.unwrap().prefix, ".", "cached copy");

    store.invalidate("222");
    assert_eq!(store.load("222").await.unwrap().prefix, "/");
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_store_rejects_non_object_and_bad_json() {
    let dir = scratch_dir("store_bad");
    std::fs::write(dir.join("333.json"), "[1, 2]").unwrap();
    std::fs::write(dir.join("444.json"), "{not json").unwrap();
    let store = ConfigStore::new(&dir, UserConfig::default(), Duration::from_secs(300));
    assert_eq!(store.load("333").await.unwrap(), UserConfig::default());
    assert!(store.load("444").await.is_err());
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_admin_list_reads_and_normalizes() {
    let dir = scratch_dir("admins");
    let path = dir.join("admin.json");
    std::fs::write(&path, r#"["+94 77 123 4567", "15551234567", ""]"#).unwrap();

    let admins = AdminList::new(&path, Duration::from_secs(300));
    assert_eq!(admins.numbers().await, vec!["94771234567", "15551234567"]);
    assert!(admins.contains("+1 555 123 4567").await);
    assert!(!admins.contains("999").await);
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_admin_list_refreshes_after_ttl() {
    let dir = scratch_dir("admins_ttl");
    let path = dir.join("admin.json");
    std::fs::write(&path, r#"["1"]"#).unwrap();

    let cached = AdminList::new(&path, Duration::from_secs(300));
    let uncached = AdminList::new(&path, Duration::ZERO);
    assert_eq!(cached.numbers().await, vec!["1"]);
    assert_eq!(uncached.numbers().await, vec!["1"]);

    std::fs::write(&path, r#"["2"]"#).unwrap();
    assert_eq!(cached.numbers().await, vec!["1"]);
    assert_eq!(uncached.numbers().await, vec!["2"]);
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_admin_list_missing_or_invalid_is_empty() {
    let dir = scratch_dir("admins_bad");
    let missing = AdminList::new(dir.join("none.json"), Duration::from_secs(1));
    assert!(missing.numbers().await.is_empty());

    std::fs::write(dir.join("bad.json"), "{").unwrap();
    let bad = AdminList::new(dir.join("bad.json"), Duration::from_secs(1));
    assert!(bad.numbers().await.is_empty());
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_store_with_zero_ttl_always_reads_disk() {
    let dir = scratch_dir("store_no_ttl");
    let store = ConfigStore::new(&dir, UserConfig::default(), Duration::ZERO);
    assert_eq!(store.load("555").await.unwrap().prefix, ".");

    std::fs::write(dir.join("555.json"), r##"{"PREFIX": "#"}"##).unwrap();
    assert_eq!(store.load("555").await.unwrap().prefix, "#");
    let _ = std::fs::remove_dir_all(&dir);
}
