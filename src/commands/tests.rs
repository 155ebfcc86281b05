use super::group::tagall_text;
use super::info::{format_uptime, menu_text};
use super::media::{is_facebook_url, is_youtube_url, parse_media_link, MediaKind};
use super::*;
use beacon_core::config::{AdminList, BotConfig, ConfigStore, MediaConfig, SessionsConfig, UserConfig};
use beacon_core::message::{ChatMessage, MessageBody, MessageContent, StatusUpdate};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

const SESSION: &str = "555";
const OWNER_JID: &str = "555@s.whatsapp.net";
const STRANGER_JID: &str = "999@s.whatsapp.net";
const GROUP_JID: &str = "120363001234567890@g.us";

fn temp_dir(tag: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!(
        "beacon-commands-{tag}-{}-{n}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[derive(Default)]
struct FakeSocket {
    sent: Mutex<Vec<OutgoingMessage>>,
    participants: Vec<String>,
    picture: Option<String>,
}

impl FakeSocket {
    fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }

    fn texts(&self) -> Vec<String> {
        self.sent()
            .iter()
            .filter_map(|m| m.body.preview().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl Socket for FakeSocket {
    fn number(&self) -> &str {
        SESSION
    }

    async fn send(&self, message: OutgoingMessage) -> Result<String, BeaconError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(message);
        Ok(format!("out-{}", sent.len()))
    }

    async fn mark_status_viewed(&self, _status: &StatusUpdate) -> Result<(), BeaconError> {
        Ok(())
    }

    async fn react_to_status(&self, _status: &StatusUpdate, _emoji: &str) -> Result<(), BeaconError> {
        Ok(())
    }

    async fn send_recording(&self, _chat: &str) -> Result<(), BeaconError> {
        Ok(())
    }

    async fn group_participants(&self, _group: &str) -> Result<Vec<String>, BeaconError> {
        Ok(self.participants.clone())
    }

    async fn profile_picture_url(&self, _jid: &str) -> Result<Option<String>, BeaconError> {
        Ok(self.picture.clone())
    }

    async fn close(&self) -> Result<(), BeaconError> {
        Ok(())
    }
}

struct Harness {
    registry: CommandRegistry,
    bot: Arc<BotContext>,
    dir: PathBuf,
}

impl Harness {
    fn new(tag: &str) -> Self {
        let dir = temp_dir(tag);
        let bot = Arc::new(BotContext::new(
            BotConfig::default(),
            ConfigStore::new(dir.join("configs"), UserConfig::default(), Duration::from_secs(60)),
            AdminList::new(dir.join("admins.json"), Duration::from_secs(60)),
            SessionsConfig::default(),
        ));
        let media = MediaClient::new(&MediaConfig {
            api_base: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
        })
        .unwrap();
        Self {
            registry: CommandRegistry::new(bot.clone(), media),
            bot,
            dir,
        }
    }

    async fn run(&self, socket: &Arc<FakeSocket>, sender: &str, chat: &str, text: &str) {
        let (command, args) =
            beacon_sessions::dispatcher::parse_command(text, ".").expect("command text");
        let invocation = Invocation {
            session: SESSION.to_string(),
            command,
            args,
            prefix: ".".to_string(),
            message: ChatMessage {
                id: "msg-1".to_string(),
                chat: chat.to_string(),
                sender: sender.to_string(),
                push_name: None,
                is_group: chat.ends_with("@g.us"),
                is_from_me: false,
                content: MessageContent::text(text),
                timestamp: chrono::Utc::now(),
            },
        };
        let socket: Arc<dyn Socket> = socket.clone();
        self.registry.handle(socket, invocation).await.unwrap();
    }
}

fn socket() -> Arc<FakeSocket> {
    Arc::new(FakeSocket::default())
}

#[test]
fn test_command_parse() {
    assert_eq!(Command::parse("alive"), Some(Command::Alive));
    assert_eq!(Command::parse("help"), Some(Command::Menu));
    assert_eq!(Command::parse("yta"), Some(Command::YtAudio));
    assert_eq!(Command::parse("getpp"), Some(Command::GetPp));
    assert_eq!(Command::parse("nope"), None);
}

#[tokio::test]
async fn test_unknown_command_is_silent() {
    let h = Harness::new("unknown");
    let s = socket();
    h.run(&s, OWNER_JID, OWNER_JID, ".dance").await;
    assert!(s.sent().is_empty());
}

#[tokio::test]
async fn test_config_set_then_view() {
    let h = Harness::new("config-roundtrip");
    let s = socket();
    h.run(&s, OWNER_JID, OWNER_JID, ".config set FOO bar").await;
    h.run(&s, OWNER_JID, OWNER_JID, ".config view").await;

    let texts = s.texts();
    assert_eq!(texts[0], "✅ FOO updated");
    assert!(texts[1].lines().any(|l| l == "FOO: bar"), "{}", texts[1]);
    assert!(h.dir.join("configs").join("555.json").exists());
}

#[tokio::test]
async fn test_config_set_emoji_list() {
    let h = Harness::new("config-emoji");
    let s = socket();
    h.run(&s, OWNER_JID, OWNER_JID, ".config set AUTO_LIKE_EMOJI 🔥,😍").await;
    let config = h.bot.configs.load(SESSION).await.unwrap();
    assert_eq!(config.like_emojis, vec!["🔥".to_string(), "😍".to_string()]);

    h.run(&s, OWNER_JID, OWNER_JID, ".config view").await;
    assert!(s.texts()[1].contains("AUTO_LIKE_EMOJI: 🔥,😍"));
}

#[tokio::test]
async fn test_config_set_multiword_value() {
    let h = Harness::new("config-multiword");
    let s = socket();
    h.run(&s, OWNER_JID, OWNER_JID, ".config set GREETING hello there").await;
    let config = h.bot.configs.load(SESSION).await.unwrap();
    assert_eq!(
        config.extra.get("GREETING").and_then(|v| v.as_str()),
        Some("hello there")
    );
}

#[tokio::test]
async fn test_config_set_rejects_strangers() {
    let h = Harness::new("config-stranger");
    let s = socket();
    h.run(&s, STRANGER_JID, STRANGER_JID, ".config set PREFIX !").await;
    assert!(s.texts()[0].starts_with("⛔"));
    assert_eq!(h.bot.configs.load(SESSION).await.unwrap().prefix, ".");
}

#[tokio::test]
async fn test_config_set_allows_admins() {
    let h = Harness::new("config-admin");
    std::fs::write(h.dir.join("admins.json"), r#"["+999"]"#).unwrap();
    let s = socket();
    h.run(&s, STRANGER_JID, STRANGER_JID, ".config set PREFIX !").await;
    assert_eq!(h.bot.configs.load(SESSION).await.unwrap().prefix, "!");
}

#[tokio::test]
async fn test_config_set_invalid_value_is_reported() {
    let h = Harness::new("config-invalid");
    let s = socket();
    h.run(&s, OWNER_JID, OWNER_JID, ".config set MAX_RETRIES lots").await;
    assert!(s.texts()[0].starts_with("❌ MAX_RETRIES expects a number"));
    assert!(!h.dir.join("configs").join("555.json").exists());
}

#[tokio::test]
async fn test_config_without_subcommand_shows_usage() {
    let h = Harness::new("config-usage");
    let s = socket();
    h.run(&s, OWNER_JID, OWNER_JID, ".config").await;
    let text = &s.texts()[0];
    assert!(text.contains(".config view"));
    assert!(text.contains("AUTO_VIEW_STATUS"));
}

#[tokio::test]
async fn test_replies_quote_the_command() {
    let h = Harness::new("quote");
    let s = socket();
    h.run(&s, OWNER_JID, OWNER_JID, ".repo").await;
    let sent = s.sent();
    assert_eq!(sent[0].quoted.as_deref(), Some("msg-1"));
    assert_eq!(sent[0].chat, OWNER_JID);
    assert!(s.texts()[0].contains(&BotConfig::default().repo_url));
}

#[tokio::test]
async fn test_ping_reports_latency() {
    let h = Harness::new("ping");
    let s = socket();
    h.run(&s, OWNER_JID, OWNER_JID, ".ping").await;
    let texts = s.texts();
    assert_eq!(texts.len(), 2);
    assert!(texts[1].starts_with("⚡ Latency:"));
}

#[tokio::test]
async fn test_alive_text_without_image() {
    let h = Harness::new("alive");
    let s = socket();
    h.run(&s, OWNER_JID, OWNER_JID, ".alive").await;
    let text = &s.texts()[0];
    assert!(text.contains("*Beacon* is alive"));
    assert!(text.contains("Uptime: 0h 0m"));
}

#[tokio::test]
async fn test_alive_sends_configured_image() {
    let h = Harness::new("alive-image");
    let image = h.dir.join("alive.png");
    std::fs::write(&image, [0x89, b'P', b'N', b'G']).unwrap();
    h.bot
        .configs
        .set(SESSION, "IMAGE_PATH", image.to_str().unwrap())
        .await
        .unwrap();

    let s = socket();
    h.run(&s, OWNER_JID, OWNER_JID, ".alive").await;
    match &s.sent()[0].body {
        MessageBody::Image {
            mimetype, caption, ..
        } => {
            assert_eq!(mimetype, "image/png");
            assert!(caption.as_deref().unwrap().contains("is alive"));
        }
        other => panic!("expected image, got {other:?}"),
    }
}

#[test]
fn test_menu_uses_prefix() {
    let menu = menu_text("Beacon", "!");
    assert!(menu.starts_with("*Beacon commands*"));
    assert!(menu.contains("• !alive"));
    assert!(menu.contains("• !config set <KEY> <VALUE>"));
    assert!(!menu.contains("• ."));
}

#[test]
fn test_format_uptime() {
    assert_eq!(format_uptime(Duration::from_secs(0)), "0h 0m 0s");
    assert_eq!(format_uptime(Duration::from_secs(3_725)), "1h 2m 5s");
    assert_eq!(format_uptime(Duration::from_secs(90_061)), "25h 1m 1s");
}

#[tokio::test]
async fn test_tagall_outside_group() {
    let h = Harness::new("tagall-dm");
    let s = socket();
    h.run(&s, OWNER_JID, OWNER_JID, ".tagall").await;
    assert!(s.texts()[0].contains("only works in groups"));
}

#[tokio::test]
async fn test_tagall_mentions_everyone() {
    let h = Harness::new("tagall");
    let participants = vec![
        "111@s.whatsapp.net".to_string(),
        "222:3@s.whatsapp.net".to_string(),
    ];
    let s = Arc::new(FakeSocket {
        participants: participants.clone(),
        ..Default::default()
    });
    h.run(&s, OWNER_JID, GROUP_JID, ".tagall meeting now").await;

    let sent = s.sent();
    assert_eq!(sent[0].chat, GROUP_JID);
    match &sent[0].body {
        MessageBody::Text { text, mentions } => {
            assert_eq!(mentions, &participants);
            assert_eq!(text, "📢 meeting now\n\n@111\n@222");
        }
        other => panic!("expected text, got {other:?}"),
    }
}

#[test]
fn test_tagall_default_header() {
    let text = tagall_text("", &["111@s.whatsapp.net".to_string()]);
    assert_eq!(text, "📢 Attention everyone\n\n@111");
}

#[tokio::test]
async fn test_getpp_usage_and_missing_picture() {
    let h = Harness::new("getpp");
    let s = socket();
    h.run(&s, OWNER_JID, OWNER_JID, ".getpp").await;
    h.run(&s, OWNER_JID, OWNER_JID, ".getpp +1 234").await;
    let texts = s.texts();
    assert_eq!(texts[0], "Usage: .getpp <number>");
    assert_eq!(texts[1], "❌ No visible profile picture for 1234.");
}

#[tokio::test]
async fn test_fb_rejects_other_links() {
    let h = Harness::new("fb");
    let s = socket();
    h.run(&s, OWNER_JID, OWNER_JID, ".fb").await;
    h.run(&s, OWNER_JID, OWNER_JID, ".fb https://example.com/video").await;
    let texts = s.texts();
    assert_eq!(texts[0], "Usage: .fb <facebook url>");
    assert_eq!(texts[1], "❌ That is not a Facebook video link.");
}

#[tokio::test]
async fn test_ytaudio_rejects_other_links() {
    let h = Harness::new("yt");
    let s = socket();
    h.run(&s, OWNER_JID, OWNER_JID, ".ytaudio ftp://youtube.com/x").await;
    assert_eq!(s.texts()[0], "❌ That is not a YouTube link.");
}

#[tokio::test]
async fn test_song_requires_query() {
    let h = Harness::new("song");
    let s = socket();
    h.run(&s, OWNER_JID, OWNER_JID, ".song").await;
    assert_eq!(s.texts()[0], "Usage: .song <song name>");
}

#[test]
fn test_url_validation() {
    assert!(is_facebook_url("https://www.facebook.com/watch?v=1"));
    assert!(is_facebook_url("https://fb.watch/abc"));
    assert!(!is_facebook_url("https://notfacebook.com/x"));
    assert!(!is_facebook_url("facebook.com/x"));
    assert!(is_youtube_url("https://youtu.be/dQw4w9WgXcQ"));
    assert!(is_youtube_url("https://music.youtube.com/watch?v=1"));
    assert!(!is_youtube_url("https://youtube.com.evil.net/watch"));
}

#[test]
fn test_parse_media_link_shapes() {
    let flat = parse_media_link(r#"{"url":"https://cdn/x.mp4","title":"Clip"}"#).unwrap();
    assert_eq!(flat.url, "https://cdn/x.mp4");
    assert_eq!(flat.title.as_deref(), Some("Clip"));

    let wrapped = parse_media_link(r#"{"status":true,"result":{"download_url":"https://cdn/a.mp3"}}"#)
        .unwrap();
    assert_eq!(wrapped.url, "https://cdn/a.mp3");
    assert!(wrapped.title.is_none());

    assert!(parse_media_link(r#"{"url":""}"#).is_err());
    assert!(parse_media_link("not json").is_err());
}

#[test]
fn test_lookup_url_encodes_input() {
    let client = MediaClient::new(&MediaConfig {
        api_base: "https://api.example.com/".to_string(),
        timeout_secs: 5,
    })
    .unwrap();
    let url = client.lookup_url(MediaKind::Song, "shape of you").unwrap();
    assert_eq!(url.as_str(), "https://api.example.com/song?q=shape+of+you");
}
