//! Stand-in factory when the `whatsapp-web` feature is off.

use async_trait::async_trait;
use beacon_core::{
    error::BeaconError,
    message::InboundEvent,
    traits::{Credentials, Socket, SocketFactory},
};
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct WhatsAppFactory {
    _private: (),
}

impl WhatsAppFactory {
    pub fn new(_db_path: impl Into<String>, _device_name: impl Into<String>) -> Self {
        Self { _private: () }
    }
}

#[async_trait]
impl SocketFactory for WhatsAppFactory {
    async fn connect(
        &self,
        number: &str,
        _credentials: Option<&Credentials>,
        _events: mpsc::Sender<InboundEvent>,
    ) -> Result<Arc<dyn Socket>, BeaconError> {
        Err(BeaconError::Config(format!(
            "cannot connect {number}: rebuild with the `whatsapp-web` feature"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_requires_feature() {
        let (tx, _rx) = mpsc::channel(1);
        let err = WhatsAppFactory::new("db", "Beacon")
            .connect("555", None, tx)
            .await
            .err()
            .unwrap();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("whatsapp-web"));
    }
}
