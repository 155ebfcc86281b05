//! # beacon-sessions
//!
//! Multi-tenant session manager: one socket per phone number, reconnect with
//! linear backoff, credential archiving, and per-session event dispatch.

pub mod archive;
pub mod context;
pub mod cooldown;
pub mod dispatcher;
pub mod manager;
pub mod retry;

#[cfg(test)]
mod testing;

pub use context::BotContext;
pub use dispatcher::{Dispatch, EventDispatcher};
pub use manager::{SessionInfo, SessionManager, SessionState, StartOptions};
pub use retry::RetryPolicy;
