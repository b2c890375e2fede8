//! Shared state handed to every handler.

use std::sync::Arc;

use pavilion_shared::time::Clock;

use crate::{
    chat_log::ChatLog, config::ServerConfig, domain::IdentityProvider, hub::BroadcastHub,
    online::OnlineRegistry, scheduler::RoundScheduler,
};

/// Shared application state
pub struct AppState {
    /// Broadcast groups and their member channels
    pub hub: Arc<BroadcastHub>,
    /// Bounded chat history
    pub chat_log: Arc<ChatLog>,
    /// Identity provider (login, token checks, profiles)
    pub identity: Arc<dyn IdentityProvider>,
    /// Currently connected, authenticated users
    pub online: Arc<OnlineRegistry>,
    /// Minigame round scheduler
    pub scheduler: RoundScheduler,
    /// Clock used to stamp outbound messages
    pub clock: Arc<dyn Clock>,
    /// Resolved runtime configuration
    pub config: ServerConfig,
}
