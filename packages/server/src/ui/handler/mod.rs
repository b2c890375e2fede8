mod http;
mod websocket;

pub use http::{gaming_events, health_check, minigame_webhook, version};
pub use websocket::{ws_chat_handler, ws_minigame_handler};
