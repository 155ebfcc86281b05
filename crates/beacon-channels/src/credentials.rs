//! Credential bundle stored in the session archive.
//!
//! The socket's device record (opaque bytes) is wrapped in a small JSON
//! document so archive files are self-describing.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use beacon_core::{error::BeaconError, message::normalize_number};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialBundle {
    pub number: String,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Base64 of the serialized device record.
    pub device: String,
}

impl CredentialBundle {
    pub fn new(number: &str, device: &[u8], created_at: i64) -> Self {
        Self {
            number: normalize_number(number),
            created_at,
            device: STANDARD.encode(device),
        }
    }

    pub fn device_bytes(&self) -> Result<Vec<u8>, BeaconError> {
        STANDARD
            .decode(self.device.trim())
            .map_err(|e| BeaconError::AuthExpired(format!("credential device is not base64: {e}")))
    }

    pub fn to_json(&self) -> Result<Vec<u8>, BeaconError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Parse and validate an archived bundle.
    pub fn from_json(data: &[u8]) -> Result<Self, BeaconError> {
        let bundle: Self = serde_json::from_slice(data)
            .map_err(|e| BeaconError::AuthExpired(format!("invalid credential bundle: {e}")))?;
        if normalize_number(&bundle.number).is_empty() {
            return Err(BeaconError::AuthExpired("credential bundle has no number".into()));
        }
        if bundle.device.trim().is_empty() {
            return Err(BeaconError::AuthExpired("credential bundle has no device".into()));
        }
        Ok(bundle)
    }

    /// Device bytes, after checking the bundle belongs to `number`.
    pub fn device_for(&self, number: &str) -> Result<Vec<u8>, BeaconError> {
        let wanted = normalize_number(number);
        if normalize_number(&self.number) != wanted {
            return Err(BeaconError::AuthExpired(format!(
                "credentials belong to {}, not {wanted}",
                self.number
            )));
        }
        self.device_bytes()
    }
}
