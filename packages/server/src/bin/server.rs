//! Session coordination server for the Pavilion platform.
//!
//! Serves the chat and minigame websocket endpoints plus a small HTTP API.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin pavilion-server
//! cargo run --bin pavilion-server -- --host 0.0.0.0 --port 8000
//! ```

use std::sync::Arc;

use clap::Parser;

use pavilion_server::{
    chat_log::{ChatLog, DEFAULT_HISTORY_CAP, DEFAULT_HISTORY_KEY},
    config::ServerConfig,
    hub::BroadcastHub,
    infrastructure::{HttpIdentityProvider, InMemoryHistoryStore},
    online::OnlineRegistry,
    scheduler::RoundScheduler,
    ui::{Server, state::AppState},
};
use pavilion_shared::{logger::setup_logger, time::SystemClock};

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "Realtime chat and minigame session server", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8000")]
    port: u16,

    /// Base URL of the identity service
    #[arg(long, default_value = "http://127.0.0.1:9000")]
    identity_url: String,

    /// Audience expected in access tokens
    #[arg(long, default_value = "pavilion")]
    token_audience: String,

    /// Environment label reported by the version endpoint
    #[arg(long, default_value = "dev")]
    environment: String,

    /// Number of chat messages kept in history
    #[arg(long, default_value_t = DEFAULT_HISTORY_CAP)]
    history_cap: usize,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_CRATE_NAME"), "debug");

    let args = Args::parse();

    // The token secret never goes on the command line
    let verify_secret =
        std::env::var("TOKEN_VERIFY_SECRET").unwrap_or_else(|_| "dev-secret".to_string());

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        identity_url: args.identity_url,
        token_audience: args.token_audience,
        verify_secret,
        environment: args.environment,
        history_cap: args.history_cap,
    };

    // Initialize dependencies in order:
    // 1. Clock and hub
    // 2. Stores and identity provider
    // 3. Services
    // 4. AppState
    // 5. Server

    // 1. Clock and broadcast hub
    let clock = Arc::new(SystemClock);
    let hub = Arc::new(BroadcastHub::new());

    // 2. History store and identity provider
    let store = Arc::new(InMemoryHistoryStore::new());
    let identity = match HttpIdentityProvider::new(
        &config.identity_url,
        &config.token_audience,
        &config.verify_secret,
    ) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            tracing::error!("Failed to build identity provider: {}", e);
            std::process::exit(1);
        }
    };

    // 3. Chat log, presence registry and round scheduler
    let chat_log = Arc::new(ChatLog::new(
        store,
        DEFAULT_HISTORY_KEY,
        config.history_cap,
    ));
    let online = Arc::new(OnlineRegistry::new());
    let scheduler = RoundScheduler::new(hub.clone(), online.clone(), clock.clone());

    // 4. Shared application state
    let state = Arc::new(AppState {
        hub,
        chat_log,
        identity,
        online,
        scheduler,
        clock,
        config: config.clone(),
    });

    // 5. Create and run the server
    let server = Server::new(state);
    if let Err(e) = server.run(config.host, config.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
