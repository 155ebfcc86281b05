//! Translate `whatsapp-rust` events into session inbound events.

use crate::inbound::{classify, EchoFilter, RawMessage};
use crate::qr::render_terminal;
use beacon_core::error::BeaconError;
use beacon_core::message::{ConnectionEvent, InboundEvent, MessageContent};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};
use wacore::types::events::Event;
use wacore::types::message::MessageInfo;
use waproto::whatsapp as wa;

/// Signals the outcome of the first connection attempt to `connect`.
pub(super) type ReadySlot = Arc<Mutex<Option<oneshot::Sender<Result<(), BeaconError>>>>>;

/// State shared by every event callback of one bot.
#[derive(Clone)]
pub(super) struct EventContext {
    pub number: String,
    pub events: mpsc::Sender<InboundEvent>,
    pub echoes: Arc<Mutex<EchoFilter>>,
    pub ready: ReadySlot,
}

impl EventContext {
    async fn signal_ready(&self, outcome: Result<(), BeaconError>) {
        if let Some(tx) = self.ready.lock().await.take() {
            let _ = tx.send(outcome);
        }
    }

    async fn forward(&self, event: InboundEvent) {
        if self.events.send(event).await.is_err() {
            debug!("{}: inbound receiver dropped", self.number);
        }
    }
}

pub(super) async fn handle_event(event: Event, ctx: EventContext) {
    match event {
        Event::PairingQrCode { code, .. } => {
            info!("{}: scan the QR code with WhatsApp > Linked Devices", ctx.number);
            match render_terminal(&code) {
                Ok(qr) => eprintln!("\n{qr}"),
                Err(e) => warn!("{}: QR render failed: {e}", ctx.number),
            }
        }
        Event::PairSuccess(_) => {
            info!("{}: pairing successful", ctx.number);
        }
        Event::Connected(_) => {
            info!("{}: connected", ctx.number);
            ctx.signal_ready(Ok(())).await;
            ctx.forward(InboundEvent::Connection(ConnectionEvent::Connected))
                .await;
        }
        Event::Disconnected(_) => {
            warn!("{}: disconnected", ctx.number);
            ctx.signal_ready(Err(BeaconError::TransientNetwork(
                "disconnected before login".into(),
            )))
            .await;
            ctx.forward(InboundEvent::Connection(ConnectionEvent::Disconnected {
                reason: "connection closed".into(),
            }))
            .await;
        }
        Event::StreamError(e) => {
            warn!("{}: stream error: {e:?}", ctx.number);
            ctx.forward(InboundEvent::Connection(ConnectionEvent::Disconnected {
                reason: format!("stream error: {e:?}"),
            }))
            .await;
        }
        Event::LoggedOut(_) => {
            warn!("{}: logged out, session invalidated", ctx.number);
            ctx.signal_ready(Err(BeaconError::AuthExpired(format!(
                "{} was logged out",
                ctx.number
            ))))
            .await;
            ctx.forward(InboundEvent::Connection(ConnectionEvent::LoggedOut))
                .await;
        }
        Event::Message(msg, info) => {
            if ctx.echoes.lock().await.take(&info.id) {
                debug!("{}: skipping own echo {}", ctx.number, info.id);
                return;
            }
            if let Some(event) = classify(raw_message(&msg, &info)) {
                ctx.forward(event).await;
            }
        }
        _ => {}
    }
}

/// Unwrap nested wrappers (device_sent, ephemeral, view_once).
pub(super) fn unwrap_message(msg: &wa::Message) -> &wa::Message {
    msg.device_sent_message
        .as_ref()
        .and_then(|d| d.message.as_deref())
        .or_else(|| {
            msg.ephemeral_message
                .as_ref()
                .and_then(|e| e.message.as_deref())
        })
        .or_else(|| {
            msg.view_once_message
                .as_ref()
                .and_then(|v| v.message.as_deref())
        })
        .unwrap_or(msg)
}

/// Text-bearing slots of a protocol message.
pub(super) fn message_content(msg: &wa::Message) -> MessageContent {
    let inner = unwrap_message(msg);
    MessageContent {
        conversation: inner.conversation.clone(),
        extended_text: inner
            .extended_text_message
            .as_ref()
            .and_then(|e| e.text.clone()),
        button_reply: inner
            .buttons_response_message
            .as_ref()
            .and_then(|b| b.selected_button_id.clone()),
        image_caption: inner.image_message.as_ref().and_then(|i| i.caption.clone()),
        video_caption: inner.video_message.as_ref().and_then(|v| v.caption.clone()),
    }
}

fn raw_message(msg: &wa::Message, info: &MessageInfo) -> RawMessage {
    RawMessage {
        id: info.id.clone(),
        chat: info.source.chat.to_string(),
        sender: info.source.sender.to_string(),
        push_name: Some(info.push_name.clone()),
        is_from_me: info.source.is_from_me,
        is_group: info.source.is_group,
        content: message_content(msg),
        timestamp: chrono::Utc::now(),
    }
}
