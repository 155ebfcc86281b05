//! WhatsApp Web sockets via `whatsapp-rust`.
//!
//! Every session runs its own bot. Protocol state for all numbers lives in
//! one SQLite database at the factory's `db_path`, partitioned by phone.

mod events;
mod send;
mod socket;


pub use socket::WhatsAppSocket;

use crate::credentials::CredentialBundle;
use crate::inbound::EchoFilter;
use crate::whatsapp_store::WhatsAppStorePool;
use async_trait::async_trait;
use beacon_core::{
    error::BeaconError,
    message::{normalize_number, InboundEvent},
    traits::{Credentials, Socket, SocketFactory},
};
use events::{handle_event, EventContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex, OnceCell};
use tracing::info;
use whatsapp_rust::bot::Bot;
use whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory;
use whatsapp_rust_ureq_http_client::UreqHttpClient;

/// How long `connect` waits for login (including a QR scan).
const LOGIN_TIMEOUT: Duration = Duration::from_secs(120);

/// Sent message IDs remembered per socket for echo suppression.
const ECHO_CAPACITY: usize = 512;

/// Opens WhatsApp Web sockets.
pub struct WhatsAppFactory {
    db_path: String,
    device_name: String,
    pool: OnceCell<WhatsAppStorePool>,
}

impl WhatsAppFactory {
    pub fn new(db_path: impl Into<String>, device_name: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            device_name: device_name.into(),
            pool: OnceCell::new(),
        }
    }

    async fn pool(&self) -> Result<&WhatsAppStorePool, BeaconError> {
        self.pool
            .get_or_try_init(|| async {
                if let Some(parent) = std::path::Path::new(&self.db_path).parent() {
                    std::fs::create_dir_all(parent)?;
                }
                WhatsAppStorePool::open(&self.db_path)
                    .await
                    .map_err(|e| BeaconError::Channel(format!("whatsapp store init failed: {e}")))
            })
            .await
    }
}

#[async_trait]
impl SocketFactory for WhatsAppFactory {
    async fn connect(
        &self,
        number: &str,
        credentials: Option<&Credentials>,
        events: mpsc::Sender<InboundEvent>,
    ) -> Result<Arc<dyn Socket>, BeaconError> {
        let number = normalize_number(number);
        let store = self.pool().await?.tenant(&number);

        let paired = store
            .device_blob()
            .await
            .map_err(|e| BeaconError::Channel(format!("device read failed: {e}")))?
            .is_some();
        if !paired {
            if let Some(creds) = credentials {
                let device = CredentialBundle::from_json(&creds.data)?.device_for(&number)?;
                store
                    .import_device_blob(&device)
                    .await
                    .map_err(|e| BeaconError::Channel(format!("device import failed: {e}")))?;
                info!("{number}: restored device from archived credentials");
            }
        }

        let echoes = Arc::new(Mutex::new(EchoFilter::new(ECHO_CAPACITY)));
        let (ready_tx, ready_rx) = oneshot::channel();
        let ctx = EventContext {
            number: number.clone(),
            events,
            echoes: echoes.clone(),
            ready: Arc::new(Mutex::new(Some(ready_tx))),
        };

        let mut bot = Bot::builder()
            .with_backend(Arc::new(store.clone()))
            .with_transport_factory(TokioWebSocketTransportFactory::new())
            .with_http_client(UreqHttpClient::new())
            .with_device_props(
                Some(self.device_name.clone()),
                None,
                Some(waproto::whatsapp::device_props::PlatformType::Desktop),
            )
            .on_event(move |event, _client| handle_event(event, ctx.clone()))
            .build()
            .await
            .map_err(|e| BeaconError::Channel(format!("whatsapp bot build failed: {e}")))?;

        let client = bot.client();
        let handle = bot
            .run()
            .await
            .map_err(|e| BeaconError::TransientNetwork(format!("whatsapp bot run failed: {e}")))?;

        let outcome = tokio::time::timeout(LOGIN_TIMEOUT, ready_rx).await;
        let login = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BeaconError::TransientNetwork(
                "bot stopped before login".into(),
            )),
            Err(_) => Err(BeaconError::TransientNetwork(format!(
                "no login within {}s",
                LOGIN_TIMEOUT.as_secs()
            ))),
        };
        if let Err(e) = login {
            handle.abort();
            if matches!(e, BeaconError::AuthExpired(_)) {
                // Revoked device: drop its keys so the next start pairs afresh.
                let _ = store.clear().await;
            }
            return Err(e);
        }

        Ok(Arc::new(WhatsAppSocket {
            number,
            client,
            store,
            echoes,
            run: Mutex::new(Some(handle)),
        }))
    }
}
