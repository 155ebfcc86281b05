//! Outbound protocol messages and retried sends.

use beacon_core::{error::BeaconError, message::MessageBody};
use std::time::Duration;
use tracing::{error, warn};
use wacore_binary::jid::Jid;
use waproto::whatsapp::{self as wa, message};
use whatsapp_rust::client::Client;
use whatsapp_rust::download::MediaType;

/// Delays between send attempts.
pub(super) const RETRY_DELAYS_MS: [u64; 3] = [500, 1000, 2000];

/// Send with up to three attempts. Returns the message ID.
pub(super) async fn retry_send(
    client: &Client,
    jid: &Jid,
    msg: wa::Message,
) -> Result<String, BeaconError> {
    let attempts = RETRY_DELAYS_MS.len();
    let mut last_err = String::new();

    for (attempt, delay_ms) in RETRY_DELAYS_MS.iter().enumerate() {
        match client.send_message(jid.clone(), msg.clone()).await {
            Ok(id) => return Ok(id),
            Err(e) => {
                let attempt = attempt + 1;
                last_err = e.to_string();
                if attempt < attempts {
                    warn!("send to {jid} failed ({attempt}/{attempts}): {e}, retrying in {delay_ms}ms");
                    tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                } else {
                    error!("send to {jid} failed ({attempt}/{attempts}): {e}, giving up");
                }
            }
        }
    }

    Err(BeaconError::TransientNetwork(format!(
        "send to {jid} failed after {attempts} attempts: {last_err}"
    )))
}

pub(super) fn parse_jid(raw: &str) -> Result<Jid, BeaconError> {
    raw.parse()
        .map_err(|e| BeaconError::Channel(format!("invalid JID '{raw}': {e}")))
}

/// Context info that quotes `quoted` and/or mentions `mentions`.
fn context_info(quoted: Option<&str>, mentions: &[String]) -> Option<Box<wa::ContextInfo>> {
    if quoted.is_none() && mentions.is_empty() {
        return None;
    }
    Some(Box::new(wa::ContextInfo {
        stanza_id: quoted.map(str::to_string),
        mentioned_jid: mentions.to_vec(),
        ..Default::default()
    }))
}

pub(super) fn text_message(text: &str, quoted: Option<&str>, mentions: &[String]) -> wa::Message {
    match context_info(quoted, mentions) {
        None => wa::Message {
            conversation: Some(text.to_string()),
            ..Default::default()
        },
        Some(context) => wa::Message {
            extended_text_message: Some(Box::new(message::ExtendedTextMessage {
                text: Some(text.to_string()),
                context_info: Some(context),
                ..Default::default()
            })),
            ..Default::default()
        },
    }
}

/// Media type used for the upload of a non-text body.
pub(super) fn media_type(body: &MessageBody) -> Option<MediaType> {
    match body {
        MessageBody::Text { .. } => None,
        MessageBody::Image { .. } => Some(MediaType::Image),
        MessageBody::Video { .. } => Some(MediaType::Video),
        MessageBody::Audio { .. } => Some(MediaType::Audio),
    }
}

/// Build the protocol message for an uploaded media body.
pub(super) fn media_message(
    body: &MessageBody,
    upload: whatsapp_rust::upload::UploadResponse,
    quoted: Option<&str>,
) -> Result<wa::Message, BeaconError> {
    let context = context_info(quoted, &[]);
    let msg = match body {
        MessageBody::Image {
            mimetype, caption, ..
        } => wa::Message {
            image_message: Some(Box::new(message::ImageMessage {
                mimetype: Some(mimetype.clone()),
                caption: caption.clone(),
                url: Some(upload.url),
                direct_path: Some(upload.direct_path),
                media_key: Some(upload.media_key),
                file_enc_sha256: Some(upload.file_enc_sha256),
                file_sha256: Some(upload.file_sha256),
                file_length: Some(upload.file_length),
                context_info: context,
                ..Default::default()
            })),
            ..Default::default()
        },
        MessageBody::Video {
            mimetype, caption, ..
        } => wa::Message {
            video_message: Some(Box::new(message::VideoMessage {
                mimetype: Some(mimetype.clone()),
                caption: caption.clone(),
                url: Some(upload.url),
                direct_path: Some(upload.direct_path),
                media_key: Some(upload.media_key),
                file_enc_sha256: Some(upload.file_enc_sha256),
                file_sha256: Some(upload.file_sha256),
                file_length: Some(upload.file_length),
                context_info: context,
                ..Default::default()
            })),
            ..Default::default()
        },
        MessageBody::Audio { mimetype, .. } => wa::Message {
            audio_message: Some(Box::new(message::AudioMessage {
                mimetype: Some(mimetype.clone()),
                url: Some(upload.url),
                direct_path: Some(upload.direct_path),
                media_key: Some(upload.media_key),
                file_enc_sha256: Some(upload.file_enc_sha256),
                file_sha256: Some(upload.file_sha256),
                file_length: Some(upload.file_length),
                context_info: context,
                ..Default::default()
            })),
            ..Default::default()
        },
        MessageBody::Text { .. } => {
            return Err(BeaconError::Channel("text body has no media".into()));
        }
    };
    Ok(msg)
}

/// Reaction to a status entry posted by `sender`.
pub(super) fn status_reaction(status_id: &str, sender: &str, emoji: &str) -> wa::Message {
    wa::Message {
        reaction_message: Some(Box::new(message::ReactionMessage {
            key: Some(wa::MessageKey {
                remote_jid: Some(beacon_core::message::STATUS_BROADCAST.to_string()),
                from_me: Some(false),
                id: Some(status_id.to_string()),
                participant: Some(sender.to_string()),
            }),
            text: Some(emoji.to_string()),
            sender_timestamp_ms: Some(chrono::Utc::now().timestamp_millis()),
            ..Default::default()
        })),
        ..Default::default()
    }
}
