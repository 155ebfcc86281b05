//! # beacon-channels
//!
//! WhatsApp socket adapter. The protocol client is behind the
//! `whatsapp-web` feature; helpers for credentials, inbound classification,
//! QR rendering and text chunking are always available.

pub mod credentials;
pub mod inbound;
pub mod qr;
pub mod text;

#[cfg(feature = "whatsapp-web")]
pub mod whatsapp;
#[cfg(feature = "whatsapp-web")]
pub mod whatsapp_store;

#[cfg(not(feature = "whatsapp-web"))]
mod disabled;

#[cfg(not(feature = "whatsapp-web"))]
pub use disabled::WhatsAppFactory;
#[cfg(feature = "whatsapp-web")]
pub use whatsapp::WhatsAppFactory;
