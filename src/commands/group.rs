//! `tagall` and `getpp`.

use super::CommandContext;
use beacon_core::{
    error::BeaconError,
    message::{jid_number, normalize_number, user_jid, MessageBody, OutgoingMessage},
};

/// Text that mentions every participant by number.
pub(super) fn tagall_text(note: &str, participants: &[String]) -> String {
    let header = if note.is_empty() {
        "📢 Attention everyone".to_string()
    } else {
        format!("📢 {note}")
    };
    let tags: Vec<String> = participants
        .iter()
        .map(|jid| format!("@{}", jid_number(jid)))
        .collect();
    format!("{header}\n\n{}", tags.join("\n"))
}

pub(super) async fn handle_tagall(ctx: &CommandContext<'_>) -> Result<(), BeaconError> {
    let message = &ctx.invocation.message;
    if !message.is_group {
        ctx.reply("❌ This command only works in groups.").await?;
        return Ok(());
    }
    let participants = ctx.socket.group_participants(&message.chat).await?;
    if participants.is_empty() {
        ctx.reply("❌ Could not read the group members.").await?;
        return Ok(());
    }
    let body = MessageBody::Text {
        text: tagall_text(&ctx.rest(), &participants),
        mentions: participants,
    };
    ctx.send(OutgoingMessage::new(&message.chat, body)).await?;
    Ok(())
}

pub(super) async fn handle_getpp(ctx: &CommandContext<'_>) -> Result<(), BeaconError> {
    let number = normalize_number(&ctx.rest());
    if number.is_empty() {
        ctx.reply(format!("Usage: {}", ctx.usage("<number>"))).await?;
        return Ok(());
    }
    let jid = user_jid(&number);
    let Some(url) = ctx.socket.profile_picture_url(&jid).await? else {
        ctx.reply(format!("❌ No visible profile picture for {number}."))
            .await?;
        return Ok(());
    };
    let data = match ctx.media.download(&url).await {
        Ok(data) => data,
        Err(e) => {
            ctx.reply(format!("❌ Could not download the picture: {e}"))
                .await?;
            return Ok(());
        }
    };
    let body = MessageBody::Image {
        data,
        mimetype: "image/jpeg".to_string(),
        caption: Some(format!("🖼️ Profile picture of {number}")),
    };
    ctx.send(OutgoingMessage::new(&ctx.invocation.message.chat, body))
        .await?;
    Ok(())
}
