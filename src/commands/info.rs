//! Informational commands: alive, menu, ping, uptime, repo.

use super::CommandContext;
use beacon_core::{
    error::BeaconError,
    message::{MessageBody, OutgoingMessage},
};
use std::time::{Duration, Instant};
use tracing::warn;

/// `Xh Ym Zs`.
pub fn format_uptime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Guess an image MIME type from the file extension.
fn image_mimetype(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "image/jpeg",
    }
}

pub(super) async fn handle_alive(ctx: &CommandContext<'_>) -> Result<(), BeaconError> {
    let bot = &ctx.bot.bot;
    let text = format!(
        "*{}* is alive 🟢\n\n👤 Owner: {}\n⏱️ Uptime: {}\n💡 Type {}menu for commands",
        bot.name,
        bot.owner,
        format_uptime(ctx.bot.started.elapsed()),
        ctx.invocation.prefix,
    );

    let config = ctx.bot.configs.load(&ctx.invocation.session).await?;
    if !config.image_path.is_empty() {
        match tokio::fs::read(&config.image_path).await {
            Ok(data) => {
                let body = MessageBody::Image {
                    data,
                    mimetype: image_mimetype(&config.image_path).to_string(),
                    caption: Some(text),
                };
                ctx.send(OutgoingMessage::new(&ctx.invocation.message.chat, body))
                    .await?;
                return Ok(());
            }
            Err(e) => warn!(
                number = %ctx.invocation.session,
                "alive image {} unreadable, sending text: {e}",
                config.image_path
            ),
        }
    }
    ctx.reply(text).await?;
    Ok(())
}

/// Menu text for `prefix`.
pub(super) fn menu_text(bot_name: &str, prefix: &str) -> String {
    let entries = [
        ("alive", "bot status"),
        ("menu", "this list"),
        ("ping", "response latency"),
        ("uptime", "time since start"),
        ("repo", "source repository"),
        ("tagall", "mention everyone in a group"),
        ("getpp <number>", "profile picture"),
        ("fb <url>", "download a Facebook video"),
        ("song <query>", "download a song"),
        ("ytaudio <url>", "YouTube audio"),
        ("config view", "show settings"),
        ("config set <KEY> <VALUE>", "change a setting"),
    ];
    let mut out = format!("*{bot_name} commands*\n");
    for (usage, about) in entries {
        out.push_str(&format!("\n• {prefix}{usage} - {about}"));
    }
    out
}

pub(super) async fn handle_menu(ctx: &CommandContext<'_>) -> Result<(), BeaconError> {
    ctx.reply(menu_text(&ctx.bot.bot.name, &ctx.invocation.prefix))
        .await?;
    Ok(())
}

pub(super) async fn handle_ping(ctx: &CommandContext<'_>) -> Result<(), BeaconError> {
    let start = Instant::now();
    ctx.reply("🏓 Pong!").await?;
    let latency = start.elapsed().as_millis();
    ctx.reply(format!("⚡ Latency: {latency} ms")).await?;
    Ok(())
}

pub(super) async fn handle_uptime(ctx: &CommandContext<'_>) -> Result<(), BeaconError> {
    ctx.reply(format!(
        "⏱️ Uptime: {}",
        format_uptime(ctx.bot.started.elapsed())
    ))
    .await?;
    Ok(())
}

pub(super) async fn handle_repo(ctx: &CommandContext<'_>) -> Result<(), BeaconError> {
    ctx.reply(format!("📦 Source: {}", ctx.bot.bot.repo_url))
        .await?;
    Ok(())
}
