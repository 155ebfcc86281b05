//! [`Socket`] implementation over a running `whatsapp-rust` bot.

use super::send::{
    media_message, media_type, parse_jid, retry_send, status_reaction, text_message,
};
use crate::credentials::CredentialBundle;
use crate::inbound::EchoFilter;
use crate::text::{split_message, MAX_TEXT_LEN};
use crate::whatsapp_store::SqlxWhatsAppStore;
use async_trait::async_trait;
use beacon_core::{
    error::BeaconError,
    message::{MessageBody, OutgoingMessage, StatusUpdate, STATUS_BROADCAST},
    traits::Socket,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use whatsapp_rust::client::Client;

/// One logged-in number.
pub struct WhatsAppSocket {
    pub(super) number: String,
    pub(super) client: Arc<Client>,
    pub(super) store: SqlxWhatsAppStore,
    pub(super) echoes: Arc<Mutex<EchoFilter>>,
    pub(super) run: Mutex<Option<JoinHandle<()>>>,
}

impl WhatsAppSocket {
    async fn remember(&self, id: String) {
        self.echoes.lock().await.remember(id);
    }
}

#[async_trait]
impl Socket for WhatsAppSocket {
    fn number(&self) -> &str {
        &self.number
    }

    async fn send(&self, message: OutgoingMessage) -> Result<String, BeaconError> {
        let jid = parse_jid(&message.chat)?;
        let quoted = message.quoted.as_deref();

        if let MessageBody::Text { text, mentions } = &message.body {
            let mut last_id = String::new();
            for (i, chunk) in split_message(text, MAX_TEXT_LEN).into_iter().enumerate() {
                // Only the first chunk quotes and mentions.
                let msg = if i == 0 {
                    text_message(chunk, quoted, mentions)
                } else {
                    text_message(chunk, None, &[])
                };
                last_id = retry_send(&self.client, &jid, msg).await?;
                self.remember(last_id.clone()).await;
            }
            return Ok(last_id);
        }

        let (data, kind) = match (&message.body, media_type(&message.body)) {
            (
                MessageBody::Image { data, .. }
                | MessageBody::Video { data, .. }
                | MessageBody::Audio { data, .. },
                Some(kind),
            ) => (data.clone(), kind),
            _ => return Err(BeaconError::Channel("unsupported message body".into())),
        };
        let upload = self
            .client
            .upload(data, kind)
            .await
            .map_err(|e| BeaconError::TransientNetwork(format!("media upload failed: {e}")))?;
        let msg = media_message(&message.body, upload, quoted)?;
        let id = retry_send(&self.client, &jid, msg).await?;
        self.remember(id.clone()).await;
        Ok(id)
    }

    async fn mark_status_viewed(&self, status: &StatusUpdate) -> Result<(), BeaconError> {
        let chat = parse_jid(STATUS_BROADCAST)?;
        let sender = parse_jid(&status.sender)?;
        self.client
            .mark_as_read(&chat, Some(&sender), vec![status.id.clone()])
            .await
            .map_err(|e| BeaconError::TransientNetwork(format!("read receipt failed: {e}")))?;
        debug!("{}: viewed status {} from {}", self.number, status.id, status.sender);
        Ok(())
    }

    async fn react_to_status(
        &self,
        status: &StatusUpdate,
        emoji: &str,
    ) -> Result<(), BeaconError> {
        let chat = parse_jid(STATUS_BROADCAST)?;
        let msg = status_reaction(&status.id, &status.sender, emoji);
        let id = retry_send(&self.client, &chat, msg).await?;
        self.remember(id).await;
        Ok(())
    }

    async fn send_recording(&self, chat: &str) -> Result<(), BeaconError> {
        let jid = parse_jid(chat)?;
        self.client
            .chatstate()
            .send_recording(&jid)
            .await
            .map_err(|e| BeaconError::TransientNetwork(format!("presence update failed: {e}")))
    }

    async fn group_participants(&self, group: &str) -> Result<Vec<String>, BeaconError> {
        let jid = parse_jid(group)?;
        let metadata = self
            .client
            .query_group_metadata(&jid)
            .await
            .map_err(|e| BeaconError::Channel(format!("group metadata failed: {e}")))?;
        Ok(metadata
            .participants
            .iter()
            .map(|p| p.jid.to_string())
            .collect())
    }

    async fn profile_picture_url(&self, jid: &str) -> Result<Option<String>, BeaconError> {
        let jid = parse_jid(jid)?;
        let picture = self
            .client
            .get_profile_picture(&jid, false)
            .await
            .map_err(|e| BeaconError::Channel(format!("profile picture lookup failed: {e}")))?;
        Ok(picture.map(|p| p.url))
    }

    async fn export_credentials(&self) -> Result<Option<Vec<u8>>, BeaconError> {
        let blob = self
            .store
            .device_blob()
            .await
            .map_err(|e| BeaconError::Channel(format!("device read failed: {e}")))?;
        let Some(device) = blob else {
            return Ok(None);
        };
        // created_at of zero keeps the export stable across calls; the archive
        // names the file with its own timestamp.
        let bundle = CredentialBundle::new(&self.number, &device, 0);
        bundle.to_json().map(Some)
    }

    async fn close(&self) -> Result<(), BeaconError> {
        if let Some(handle) = self.run.lock().await.take() {
            handle.abort();
            info!("{}: socket closed", self.number);
        }
        Ok(())
    }
}
