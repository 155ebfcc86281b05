//! `config view` and `config set <KEY> <VALUE...>`.

use super::CommandContext;
use beacon_core::{
    config::{UserConfig, CONFIG_KEYS},
    error::BeaconError,
    message::{jid_number, normalize_number},
};

/// Settings listing shown by `config view` (chat and CLI).
pub fn render_config(number: &str, config: &UserConfig) -> String {
    format!("⚙️ Settings for {number}\n\n{}", config.render())
}

/// Only the session's own number and admins may change settings.
async fn may_edit(ctx: &CommandContext<'_>) -> bool {
    let sender = jid_number(&ctx.invocation.message.sender);
    ctx.invocation.message.is_from_me
        || sender == normalize_number(&ctx.invocation.session)
        || ctx.bot.admins.contains(&sender).await
}

pub(super) async fn handle_config(ctx: &CommandContext<'_>) -> Result<(), BeaconError> {
    let number = &ctx.invocation.session;
    match ctx.arg(0).map(str::to_ascii_lowercase).as_deref() {
        Some("view") | Some("get") => {
            let config = ctx.bot.configs.load(number).await?;
            ctx.reply(render_config(number, &config)).await?;
        }
        Some("set") => {
            if !may_edit(ctx).await {
                ctx.reply("⛔ Only the bot owner can change settings.").await?;
                return Ok(());
            }
            let (Some(key), value) = (ctx.arg(1), ctx.invocation.args.get(2..)) else {
                ctx.reply(set_usage(ctx)).await?;
                return Ok(());
            };
            let value = value.map(|v| v.join(" ")).unwrap_or_default();
            match ctx.bot.configs.set(number, key, &value).await {
                Ok(_) => {
                    ctx.reply(format!("✅ {} updated", key.to_uppercase()))
                        .await?;
                }
                // Validation problems go back to the user; I/O errors propagate.
                Err(BeaconError::Config(problem)) => {
                    ctx.reply(format!("❌ {problem}\n\n{}", set_usage(ctx)))
                        .await?;
                }
                Err(e) => return Err(e),
            }
        }
        _ => {
            ctx.reply(format!(
                "Usage:\n{}\n{}",
                ctx.usage("view"),
                set_usage(ctx)
            ))
            .await?;
        }
    }
    Ok(())
}

fn set_usage(ctx: &CommandContext<'_>) -> String {
    format!(
        "{}\nKeys: {}",
        ctx.usage("set <KEY> <VALUE>"),
        CONFIG_KEYS.join(", ")
    )
}
