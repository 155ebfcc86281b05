//! Shared state handed to the dispatcher and command handlers.

use beacon_core::config::{AdminList, BotConfig, ConfigStore, SessionsConfig};
use std::time::Instant;

use crate::retry::RetryPolicy;

/// Caches and tuning shared by every session.
pub struct BotContext {
    pub bot: BotConfig,
    pub configs: ConfigStore,
    pub admins: AdminList,
    pub settings: SessionsConfig,
    /// Process start, for uptime reporting.
    pub started: Instant,
}

impl BotContext {
    pub fn new(
        bot: BotConfig,
        configs: ConfigStore,
        admins: AdminList,
        settings: SessionsConfig,
    ) -> Self {
        Self {
            bot,
            configs,
            admins,
            settings,
            started: Instant::now(),
        }
    }

    /// Retry policy for credential fetches and reconnects.
    pub fn session_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.settings.max_retries, self.settings.base_delay())
    }

    /// Retry policy for status actions, which use the per-number budget.
    pub fn action_retry(&self, max_retries: u32) -> RetryPolicy {
        self.session_retry().with_attempts(max_retries)
    }
}
