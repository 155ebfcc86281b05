//! Media downloaders backed by an external HTTP API.
//!
//! The API answers `GET {api_base}/{endpoint}?{param}=...` with a JSON object
//! holding a direct download `url` (optionally wrapped in `result`).

use super::CommandContext;
use beacon_core::{
    config::MediaConfig,
    error::BeaconError,
    message::{MessageBody, OutgoingMessage},
};
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

/// Kinds of lookups the download API serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Facebook,
    Song,
    YoutubeAudio,
}

impl MediaKind {
    fn endpoint(self) -> (&'static str, &'static str) {
        match self {
            Self::Facebook => ("fbdown", "url"),
            Self::Song => ("song", "q"),
            Self::YoutubeAudio => ("ytmp3", "url"),
        }
    }
}

/// A resolved download.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MediaLink {
    #[serde(alias = "download_url", alias = "download")]
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ApiResponse {
    Wrapped { result: MediaLink },
    Flat(MediaLink),
}

/// Parse an API response body.
pub fn parse_media_link(body: &str) -> Result<MediaLink, BeaconError> {
    let response: ApiResponse = serde_json::from_str(body)
        .map_err(|e| BeaconError::Command(format!("unexpected API response: {e}")))?;
    let link = match response {
        ApiResponse::Wrapped { result } => result,
        ApiResponse::Flat(link) => link,
    };
    if link.url.is_empty() {
        return Err(BeaconError::Command("API returned no download link".into()));
    }
    Ok(link)
}

fn host_of(raw: &str) -> Option<String> {
    Url::parse(raw.trim())
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
}

fn host_matches(host: &str, domains: &[&str]) -> bool {
    domains
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{d}")))
}

pub fn is_facebook_url(raw: &str) -> bool {
    host_of(raw).is_some_and(|h| host_matches(&h, &["facebook.com", "fb.watch", "fb.com"]))
}

pub fn is_youtube_url(raw: &str) -> bool {
    host_of(raw).is_some_and(|h| host_matches(&h, &["youtube.com", "youtu.be"]))
}

/// HTTP client for the download API.
pub struct MediaClient {
    http: reqwest::Client,
    api_base: String,
}

impl MediaClient {
    pub fn new(config: &MediaConfig) -> Result<Self, BeaconError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BeaconError::Config(format!("http client: {e}")))?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Lookup URL for `kind` with the user's input.
    pub fn lookup_url(&self, kind: MediaKind, input: &str) -> Result<Url, BeaconError> {
        let (path, param) = kind.endpoint();
        Url::parse_with_params(&format!("{}/{path}", self.api_base), &[(param, input)])
            .map_err(|e| BeaconError::Config(format!("invalid media api_base: {e}")))
    }

    pub async fn resolve(&self, kind: MediaKind, input: &str) -> Result<MediaLink, BeaconError> {
        let url = self.lookup_url(kind, input)?;
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| BeaconError::TransientNetwork(format!("media API request: {e}")))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| BeaconError::TransientNetwork(format!("media API body: {e}")))?;
        if !status.is_success() {
            return Err(BeaconError::Command(format!("media API returned {status}")));
        }
        parse_media_link(&body)
    }

    pub async fn download(&self, url: &str) -> Result<Vec<u8>, BeaconError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| BeaconError::TransientNetwork(format!("download: {e}")))?;
        if !resp.status().is_success() {
            return Err(BeaconError::Command(format!(
                "download returned {}",
                resp.status()
            )));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| BeaconError::TransientNetwork(format!("download body: {e}")))?;
        Ok(bytes.to_vec())
    }

    async fn fetch(&self, kind: MediaKind, input: &str) -> Result<(MediaLink, Vec<u8>), BeaconError> {
        let link = self.resolve(kind, input).await?;
        let data = self.download(&link.url).await?;
        Ok((link, data))
    }
}

/// Resolve, download and send; API failures are reported in the chat.
async fn deliver(
    ctx: &CommandContext<'_>,
    kind: MediaKind,
    input: &str,
    body: impl FnOnce(MediaLink, Vec<u8>) -> MessageBody,
) -> Result<(), BeaconError> {
    ctx.reply("⏳ Downloading...").await?;
    let (link, data) = match ctx.media.fetch(kind, input).await {
        Ok(found) => found,
        Err(e) => {
            warn!(number = %ctx.invocation.session, "{kind:?} lookup failed: {e}");
            ctx.reply(format!("❌ Download failed: {e}")).await?;
            return Ok(());
        }
    };
    info!(number = %ctx.invocation.session, "{kind:?}: sending {} bytes", data.len());
    let body = body(link, data);
    ctx.send(OutgoingMessage::new(&ctx.invocation.message.chat, body))
        .await?;
    Ok(())
}

pub(super) async fn handle_fb(ctx: &CommandContext<'_>) -> Result<(), BeaconError> {
    let Some(url) = ctx.arg(0) else {
        ctx.reply(format!("Usage: {}", ctx.usage("<facebook url>")))
            .await?;
        return Ok(());
    };
    if !is_facebook_url(url) {
        ctx.reply("❌ That is not a Facebook video link.").await?;
        return Ok(());
    }
    deliver(ctx, MediaKind::Facebook, url, |link, data| MessageBody::Video {
        data,
        mimetype: "video/mp4".to_string(),
        caption: link.title,
    })
    .await
}

pub(super) async fn handle_song(ctx: &CommandContext<'_>) -> Result<(), BeaconError> {
    let query = ctx.rest();
    if query.trim().is_empty() {
        ctx.reply(format!("Usage: {}", ctx.usage("<song name>")))
            .await?;
        return Ok(());
    }
    deliver(ctx, MediaKind::Song, &query, |_, data| MessageBody::Audio {
        data,
        mimetype: "audio/mpeg".to_string(),
    })
    .await
}

pub(super) async fn handle_ytaudio(ctx: &CommandContext<'_>) -> Result<(), BeaconError> {
    let Some(url) = ctx.arg(0) else {
        ctx.reply(format!("Usage: {}", ctx.usage("<youtube url>")))
            .await?;
        return Ok(());
    };
    if !is_youtube_url(url) {
        ctx.reply("❌ That is not a YouTube link.").await?;
        return Ok(());
    }
    deliver(ctx, MediaKind::YoutubeAudio, url, |_, data| MessageBody::Audio {
        data,
        mimetype: "audio/mpeg".to_string(),
    })
    .await
}
