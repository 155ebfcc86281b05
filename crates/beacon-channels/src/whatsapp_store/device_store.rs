//! Device identity for one number.

use async_trait::async_trait;
use wacore::store::error::{db_err, StoreError};
use wacore::store::traits::DeviceStore;
use wacore::store::Device;

use super::SqlxWhatsAppStore;

type Result<T> = wacore::store::error::Result<T>;

/// `Device` uses serde helpers that need a binary format, so it is stored
/// as bincode. The same bytes travel in archived credential bundles.
fn encode_device(device: &Device) -> Result<Vec<u8>> {
    bincode::serialize(device).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode_device(data: &[u8]) -> Result<Device> {
    bincode::deserialize(data).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[async_trait]
impl DeviceStore for SqlxWhatsAppStore {
    async fn save(&self, device: &Device) -> Result<()> {
        let data = encode_device(device)?;
        sqlx::query("INSERT OR REPLACE INTO wa_device_info (phone, data) VALUES (?, ?)")
            .bind(&self.phone)
            .bind(&data)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn load(&self) -> Result<Option<Device>> {
        let row: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT data FROM wa_device_info WHERE phone = ?")
                .bind(&self.phone)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(|(data,)| decode_device(&data)).transpose()
    }

    async fn exists(&self) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM wa_device_info WHERE phone = ?")
            .bind(&self.phone)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.is_some())
    }

    async fn create(&self) -> Result<i32> {
        // Keys are generated during pairing and persisted through `save`.
        Ok(1)
    }
}
