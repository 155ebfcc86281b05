//! Rate limits for status actions and commands.

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use std::time::{Duration, Instant};

/// At most one status action batch per `window` for one socket.
#[derive(Debug)]
pub struct StatusThrottle {
    window: Duration,
    last_fired: Option<Instant>,
}

impl StatusThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fired: None,
        }
    }

    /// `true` if an action may fire at `now`; the window restarts when it does.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        match self.last_fired {
            Some(last) if now.saturating_duration_since(last) < self.window => false,
            _ => {
                self.last_fired = Some(now);
                true
            }
        }
    }
}

/// Per-sender command cooldown with a bounded number of tracked senders.
///
/// Entries expire once their window has passed. When the cache is full the
/// least recently seen sender is forgotten.
pub struct CommandCooldown {
    window: Duration,
    last_invoked: Cache<String, Instant>,
}

impl CommandCooldown {
    pub fn new(window: Duration, capacity: usize) -> Self {
        let last_invoked = Cache::builder()
            .max_capacity(capacity.max(1) as u64)
            .eviction_policy(EvictionPolicy::lru())
            .time_to_live(window)
            .build();
        Self {
            window,
            last_invoked,
        }
    }

    /// `true` if `sender` may run a command at `now`. Only allowed calls
    /// reset the sender's window.
    pub fn check(&mut self, sender: &str, now: Instant) -> bool {
        let allowed = match self.last_invoked.get(sender) {
            Some(last) => now.saturating_duration_since(last) >= self.window,
            None => true,
        };
        if allowed {
            self.last_invoked.insert(sender.to_string(), now);
        }
        allowed
    }

    /// Senders currently tracked, after pending evictions are applied.
    pub fn len(&self) -> u64 {
        self.last_invoked.run_pending_tasks();
        self.last_invoked.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
