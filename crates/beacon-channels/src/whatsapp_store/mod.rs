//! SQLx/SQLite storage backend for `whatsapp-rust`, shared by every session.
//!
//! One database holds all numbers. Every table carries a `phone` column and
//! each [`SqlxWhatsAppStore`] only reads and writes its own rows.

mod app_sync_store;
mod device_store;
mod protocol_store;
mod signal_store;


use beacon_core::message::normalize_number;
use sqlx::{Pool, Sqlite, SqlitePool};

/// Tables scoped by phone, in creation order.
const TABLES: [&str; 14] = [
    "wa_identities",
    "wa_sessions",
    "wa_prekeys",
    "wa_signed_prekeys",
    "wa_sender_keys",
    "wa_app_sync_keys",
    "wa_app_versions",
    "wa_mutation_macs",
    "wa_skdm_recipients",
    "wa_lid_mappings",
    "wa_base_keys",
    "wa_device_lists",
    "wa_forget_sender_keys",
    "wa_device_info",
];

const SCHEMA: [&str; 14] = [
    "CREATE TABLE IF NOT EXISTS wa_identities (
        phone TEXT NOT NULL,
        address TEXT NOT NULL,
        key_data BLOB NOT NULL,
        PRIMARY KEY (phone, address)
    )",
    "CREATE TABLE IF NOT EXISTS wa_sessions (
        phone TEXT NOT NULL,
        address TEXT NOT NULL,
        session_data BLOB NOT NULL,
        PRIMARY KEY (phone, address)
    )",
    "CREATE TABLE IF NOT EXISTS wa_prekeys (
        phone TEXT NOT NULL,
        id INTEGER NOT NULL,
        record BLOB NOT NULL,
        uploaded INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (phone, id)
    )",
    "CREATE TABLE IF NOT EXISTS wa_signed_prekeys (
        phone TEXT NOT NULL,
        id INTEGER NOT NULL,
        record BLOB NOT NULL,
        PRIMARY KEY (phone, id)
    )",
    "CREATE TABLE IF NOT EXISTS wa_sender_keys (
        phone TEXT NOT NULL,
        address TEXT NOT NULL,
        record BLOB NOT NULL,
        PRIMARY KEY (phone, address)
    )",
    "CREATE TABLE IF NOT EXISTS wa_app_sync_keys (
        phone TEXT NOT NULL,
        key_id BLOB NOT NULL,
        key_data BLOB NOT NULL,
        timestamp INTEGER NOT NULL DEFAULT 0,
        fingerprint BLOB,
        PRIMARY KEY (phone, key_id)
    )",
    "CREATE TABLE IF NOT EXISTS wa_app_versions (
        phone TEXT NOT NULL,
        collection TEXT NOT NULL,
        data TEXT NOT NULL,
        PRIMARY KEY (phone, collection)
    )",
    "CREATE TABLE IF NOT EXISTS wa_mutation_macs (
        phone TEXT NOT NULL,
        collection TEXT NOT NULL,
        index_mac BLOB NOT NULL,
        version INTEGER NOT NULL,
        value_mac BLOB NOT NULL,
        PRIMARY KEY (phone, collection, index_mac)
    )",
    "CREATE TABLE IF NOT EXISTS wa_skdm_recipients (
        phone TEXT NOT NULL,
        group_jid TEXT NOT NULL,
        device_jid TEXT NOT NULL,
        PRIMARY KEY (phone, group_jid, device_jid)
    )",
    "CREATE TABLE IF NOT EXISTS wa_lid_mappings (
        phone TEXT NOT NULL,
        lid TEXT NOT NULL,
        phone_number TEXT NOT NULL,
        created_at INTEGER NOT NULL DEFAULT 0,
        updated_at INTEGER NOT NULL DEFAULT 0,
        learning_source TEXT NOT NULL DEFAULT '',
        PRIMARY KEY (phone, lid)
    )",
    "CREATE TABLE IF NOT EXISTS wa_base_keys (
        phone TEXT NOT NULL,
        address TEXT NOT NULL,
        message_id TEXT NOT NULL,
        base_key BLOB NOT NULL,
        PRIMARY KEY (phone, address, message_id)
    )",
    "CREATE TABLE IF NOT EXISTS wa_device_lists (
        phone TEXT NOT NULL,
        user TEXT NOT NULL,
        data TEXT NOT NULL,
        PRIMARY KEY (phone, user)
    )",
    "CREATE TABLE IF NOT EXISTS wa_forget_sender_keys (
        phone TEXT NOT NULL,
        group_jid TEXT NOT NULL,
        participant TEXT NOT NULL,
        PRIMARY KEY (phone, group_jid, participant)
    )",
    "CREATE TABLE IF NOT EXISTS wa_device_info (
        phone TEXT PRIMARY KEY,
        data BLOB NOT NULL
    )",
];

/// Connection pool over the shared session database.
#[derive(Clone)]
pub struct WhatsAppStorePool {
    pool: Pool<Sqlite>,
}

impl WhatsAppStorePool {
    /// Open (creating if needed) the database and its schema.
    pub async fn open(db_path: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePool::connect(&format!("sqlite:{db_path}?mode=rwc")).await?;
        Self::from_pool(pool).await
    }

    /// Schema on an existing pool; used by tests with in-memory databases.
    pub async fn from_pool(pool: Pool<Sqlite>) -> Result<Self, sqlx::Error> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        Ok(Self { pool })
    }

    /// Store view limited to `phone`'s rows.
    pub fn tenant(&self, phone: &str) -> SqlxWhatsAppStore {
        SqlxWhatsAppStore {
            pool: self.pool.clone(),
            phone: normalize_number(phone),
        }
    }
}

/// `whatsapp-rust` backend for one phone number.
#[derive(Clone)]
pub struct SqlxWhatsAppStore {
    pool: Pool<Sqlite>,
    phone: String,
}

impl SqlxWhatsAppStore {
    pub fn phone(&self) -> &str {
        &self.phone
    }

    /// Serialized device record, if this number has paired.
    pub async fn device_blob(&self) -> Result<Option<Vec<u8>>, sqlx::Error> {
        let row: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT data FROM wa_device_info WHERE phone = ?")
                .bind(&self.phone)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(data,)| data))
    }

    /// Seed the device record from archived credentials.
    pub async fn import_device_blob(&self, data: &[u8]) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT OR REPLACE INTO wa_device_info (phone, data) VALUES (?, ?)")
            .bind(&self.phone)
            .bind(data)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Drop every row owned by this number (after a logout).
    pub async fn clear(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for table in TABLES {
            sqlx::query(&format!("DELETE FROM {table} WHERE phone = ?"))
                .bind(&self.phone)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
