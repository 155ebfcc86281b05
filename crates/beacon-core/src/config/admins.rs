//! Admin numbers that receive connect notifications.

use moka::sync::Cache;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::message::normalize_number;

/// JSON array of phone numbers on disk, re-read at most once per TTL.
///
/// There is no change notification: edits to the file show up once the
/// cached copy expires.
pub struct AdminList {
    path: PathBuf,
    cache: Cache<(), Vec<String>>,
}

impl AdminList {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            cache: Cache::builder().time_to_live(ttl).build(),
        }
    }

    /// Current admin numbers. Read failures log and yield an empty list.
    pub async fn numbers(&self) -> Vec<String> {
        if let Some(hit) = self.cache.get(&()) {
            return hit;
        }

        let numbers = self.read().await;
        self.cache.insert((), numbers.clone());
        numbers
    }

    pub async fn contains(&self, number: &str) -> bool {
        let wanted = normalize_number(number);
        self.numbers().await.iter().any(|n| *n == wanted)
    }

    async fn read(&self) -> Vec<String> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("failed to read admin list {}: {e}", self.path.display());
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<String>>(&content) {
            Ok(list) => list
                .iter()
                .map(|n| normalize_number(n))
                .filter(|n| !n.is_empty())
                .collect(),
            Err(e) => {
                warn!("invalid admin list {}: {e}", self.path.display());
                Vec::new()
            }
        }
    }
}
